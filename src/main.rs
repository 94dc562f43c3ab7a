use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};

use docxide_proof::config::Config;
use docxide_proof::correct::{CommandCorrector, Corrector, IdentityCorrector};
use docxide_proof::pipeline::{Pipeline, output_key};
use docxide_proof::report::{BatchSummary, publish_summary};
use docxide_proof::storage::LocalStore;
use docxide_proof::translate::{
    CommandTranslator, Translator, fan_out_translations, is_translated_key,
};
use docxide_proof::watchdog::{Guard, MemoryEventRule, Notifier, Watchdog};
use docxide_proof::{Error, Result, correct_docx_file, extract, markup, parse_bytes};

/// Prints notifications to stdout.
struct Stdout;

impl Notifier for Stdout {
    fn publish(&self, _subject: &str, message: &str) -> Result<()> {
        println!("{message}");
        Ok(())
    }
}

#[derive(Parser)]
#[command(name = "docxide-proof", version)]
#[command(about = "Proofread DOCX files through an LLM while keeping their images and structure")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true, env = "DOCXIDE_PROOF_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Correction command line; the prompt goes to its stdin
    #[arg(long, global = true, env = "DOCXIDE_PROOF_CORRECTOR", value_name = "CMD")]
    corrector: Option<String>,

    /// Skip the model and write the document back unchanged
    #[arg(long, global = true)]
    identity: bool,

    /// Call timeout in seconds (overrides the config read timeout)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Correct a single document
    Correct {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to <input>_corrected.docx)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Styled template to build the output on
        #[arg(short, long, value_name = "FILE")]
        template: Option<PathBuf>,
    },

    /// Write translated copies of a document into the other language folders
    Translate {
        /// Directory acting as the input store
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Key of the document, e.g. english/report.docx
        #[arg(value_name = "KEY")]
        key: String,

        /// Translation command line; `{source}` and `{target}` are replaced by language codes
        #[arg(long, env = "DOCXIDE_PROOF_TRANSLATOR", value_name = "CMD")]
        translator: Option<String>,
    },

    /// Correct every document of an input directory into an output directory
    Batch {
        #[arg(value_name = "INPUT_DIR")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT_DIR")]
        output: PathBuf,

        /// Keys to process (all .docx files of the input directory if none)
        #[arg(value_name = "KEY")]
        keys: Vec<String>,

        /// Template key inside the input directory
        #[arg(long, value_name = "KEY", conflicts_with = "no_template")]
        template: Option<String>,

        /// Build outputs on a blank document
        #[arg(long)]
        no_template: bool,

        /// Translate into the other languages first
        #[arg(long)]
        translate: bool,

        /// Write the outcomes as JSON
        #[arg(long, value_name = "FILE")]
        summary_json: Option<PathBuf>,
    },

    /// Print the markup a document is sent to the model as, and its extracted images
    Inspect {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(String::from).collect()
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_ref())?;
    if let Some(command) = &cli.corrector {
        config.corrector_command = split_command(command);
    }
    if let Some(secs) = cli.timeout {
        config.client.read_timeout_secs = secs;
    }
    Ok(config)
}

fn build_corrector(cli: &Cli, config: &Config) -> Result<Box<dyn Corrector>> {
    if cli.identity {
        return Ok(Box::new(IdentityCorrector));
    }
    if config.corrector_command.is_empty() {
        return Err(Error::Config(
            "no correction command configured (use --corrector or --identity)".into(),
        ));
    }
    Ok(Box::new(CommandCorrector::from_command_line(
        &config.corrector_command,
        config.client.clone(),
    )?))
}

fn translator_for(command: &[String], config: &Config) -> Result<CommandTranslator> {
    if command.is_empty() {
        return Err(Error::Config(
            "no translation command configured (use --translator)".into(),
        ));
    }
    CommandTranslator::from_command_line(command, config.client.clone())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Correct {
            input,
            output,
            template,
        } => {
            let corrector = build_corrector(&cli, &config)?;
            let output = output.clone().unwrap_or_else(|| {
                PathBuf::from(output_key(&input.to_string_lossy()))
            });
            let corrected =
                correct_docx_file(input, &output, template.as_deref(), corrector.as_ref())?;
            println!("{}", output.display());
            if !corrected.report.is_clean() || !corrected.drift.is_empty() {
                eprintln!(
                    "warning: images inserted {}, left as text {:?}, never matched {:?}",
                    corrected.report.inserted,
                    corrected.report.unmatched_tokens,
                    corrected.report.unconsumed
                );
            }
        }

        Command::Translate {
            root,
            key,
            translator,
        } => {
            let command = translator
                .as_deref()
                .map(split_command)
                .unwrap_or_else(|| config.translator_command.clone());
            let translator = translator_for(&command, &config)?;
            let store = LocalStore::new(root);
            for produced in fan_out_translations(&store, key, &translator)? {
                println!("{produced}");
            }
        }

        Command::Batch {
            input,
            output,
            keys,
            template,
            no_template,
            translate,
            summary_json,
        } => {
            let mut config = config.clone();
            if let Some(key) = template {
                config.template_key = Some(key.clone());
            } else if *no_template {
                config.template_key = None;
            }

            let corrector = build_corrector(&cli, &config)?;
            let translator = if *translate {
                Some(translator_for(&config.translator_command, &config)?)
            } else {
                None
            };

            let input_store = LocalStore::new(input);
            let output_store = LocalStore::new(output);
            let keys = if keys.is_empty() {
                input_store
                    .list()?
                    .into_iter()
                    .filter(|k| k.ends_with(".docx"))
                    .filter(|k| config.template_key.as_deref() != Some(k.as_str()))
                    .filter(|k| !k.ends_with("_corrected.docx"))
                    .filter(|k| !*translate || !is_translated_key(k))
                    .collect()
            } else {
                keys.clone()
            };

            let rule = MemoryEventRule::new(config.rule_name.clone());
            let guard = Guard::new(Watchdog::from_config(&config), &rule, &Stdout);
            let pipeline = Pipeline {
                config: &config,
                input: &input_store,
                output: &output_store,
                corrector: corrector.as_ref(),
                translator: translator.as_ref().map(|t| t as &dyn Translator),
                guard: Some(&guard),
            };
            let result = pipeline.process_batch(&keys);
            publish_summary(&result, &Stdout)?;
            let outcomes = result?;
            let summary = BatchSummary::from_outcomes(&outcomes);

            if let Some(path) = summary_json {
                let json = serde_json::to_vec_pretty(&outcomes)?;
                std::fs::write(path, json)?;
            }
            if !summary.failed.is_empty() {
                process::exit(2);
            }
        }

        Command::Inspect { input } => {
            let parsed = parse_bytes(&std::fs::read(input)?)?;
            let extraction = extract(&parsed);
            print!("{}", markup::project(&extraction.document));
            for association in &extraction.associations {
                eprintln!(
                    "{} <- {} ({}, {} bytes, paragraph {})",
                    association.token,
                    association.rel_id,
                    association.asset.part_name,
                    association.asset.data.len(),
                    association.paragraph_index
                );
            }
            if extraction.document.table_count() > 0 {
                eprintln!(
                    "{} tables are not part of the markup",
                    extraction.document.table_count()
                );
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let t0 = Instant::now();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    log::info!("Done in {:.1}s", t0.elapsed().as_secs_f64());
}
