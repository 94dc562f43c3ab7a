use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::placeholder::{PlaceholderToken, find_tokens};

pub trait Corrector: Send + Sync {
    /// Return a corrected version of `markup`.
    fn correct(&self, markup: &str) -> Result<String>;
}

/// Hands the markup back unchanged. Useful for dry runs and for testing the
/// round trip without a model.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCorrector;

impl Corrector for IdentityCorrector {
    fn correct(&self, markup: &str) -> Result<String> {
        Ok(markup.to_string())
    }
}

const PREAMBLE: &str = "\
You are an assistant specializing in rewriting documents. You are especially good at spelling and \
grammar checks, and at making sure documents have a business-appropriate tone.
I will provide you with some text that you will check for spelling and grammar accuracy. You will \
also check that the document is written in business-professional language.
These documents may have been translated. If a translation is too literal and does not make sense \
in context, update the sentence accordingly.
The document has HTML formatting and is written in English, Spanish or French.

Your job is to correct any spelling or grammar mistake you see in the following text, and to make \
sure every sentence is written in a business-professional tone.

Rules:
- Keep every placeholder of the form [IMAGE_n] exactly as written, in the same order and in the \
same place. Do not add, remove, renumber or translate placeholders.
- Do not change any of the HTML markup. Keep every tag and attribute; make all edits in place.
- Do not add headers that are not present in the original.
- Do not add any text of your own. No introduction such as \"Here is the corrected text:\" and no \
notes about the changes you made.
- If a sentence is not in a business-professional tone, rewrite it without removing any of its \
information.
- Return your output in the same language as the input.
- Correct any translations that seem too literal and don't make sense in context.

Here is the text:

";

/// The full request sent to the model: fixed instructions followed by the markup.
pub fn build_prompt(markup: &str) -> String {
    let mut prompt = String::with_capacity(PREAMBLE.len() + markup.len() + 1);
    prompt.push_str(PREAMBLE);
    prompt.push_str(markup);
    if !markup.ends_with('\n') {
        prompt.push('\n');
    }
    prompt
}

/// Remove markdown code fences and a leading "Here is ...:" line.
pub fn strip_commentary(response: &str) -> String {
    let mut text = response.trim();

    if let Some((first, rest)) = text.split_once('\n') {
        let first = first.trim();
        let lower = first.to_lowercase();
        if !first.starts_with('<')
            && first.ends_with(':')
            && (lower.starts_with("here is") || lower.starts_with("here's"))
        {
            text = rest.trim_start();
        }
    }

    if let Some(rest) = text.strip_prefix("```") {
        // Skip the info string (```html).
        let body = rest.split_once('\n').map_or("", |(_, body)| body);
        text = body.trim_end();
        text = text.strip_suffix("```").unwrap_or(text).trim_end();
    }

    text.to_string()
}

/// How the tokens in a corrected text differ from the ones that were sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TokenDrift {
    /// Sent but not returned.
    pub missing: Vec<PlaceholderToken>,
    /// Returned more often than sent.
    pub duplicated: Vec<PlaceholderToken>,
    /// Returned but never sent.
    pub invented: Vec<PlaceholderToken>,
    /// The tokens present on both sides come back in a different order.
    pub reordered: bool,
}

impl TokenDrift {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty()
            && self.duplicated.is_empty()
            && self.invented.is_empty()
            && !self.reordered
    }
}

fn token_counts(tokens: &[PlaceholderToken]) -> BTreeMap<PlaceholderToken, usize> {
    let mut counts = BTreeMap::new();
    for &token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

fn first_occurrences(tokens: &[PlaceholderToken]) -> Vec<PlaceholderToken> {
    let mut seen = Vec::new();
    for &token in tokens {
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}

pub fn check_tokens(before: &str, after: &str) -> TokenDrift {
    let sent: Vec<_> = find_tokens(before).into_iter().map(|m| m.token).collect();
    let returned: Vec<_> = find_tokens(after).into_iter().map(|m| m.token).collect();
    let sent_counts = token_counts(&sent);
    let returned_counts = token_counts(&returned);

    let mut drift = TokenDrift::default();
    for (token, &count) in &sent_counts {
        match returned_counts.get(token) {
            None => drift.missing.push(*token),
            Some(&n) if n > count => drift.duplicated.push(*token),
            Some(_) => {}
        }
    }
    drift.invented = returned_counts
        .keys()
        .filter(|t| !sent_counts.contains_key(t))
        .copied()
        .collect();

    let common_sent: Vec<_> = first_occurrences(&sent)
        .into_iter()
        .filter(|t| returned_counts.contains_key(t))
        .collect();
    let common_returned: Vec<_> = first_occurrences(&returned)
        .into_iter()
        .filter(|t| sent_counts.contains_key(t))
        .collect();
    drift.reordered = common_sent != common_returned;

    drift
}

/// Pipes the prompt into an external program and reads the answer from its
/// stdout. The program is killed once the call timeout passes.
#[derive(Clone, Debug)]
pub struct CommandCorrector {
    program: String,
    args: Vec<String>,
    options: ClientOptions,
}

impl CommandCorrector {
    pub fn new(program: impl Into<String>, args: Vec<String>, options: ClientOptions) -> Self {
        Self {
            program: program.into(),
            args,
            options,
        }
    }

    /// Build from a `[program, args...]` command line.
    pub fn from_command_line(command: &[String], options: ClientOptions) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config("empty corrector command".into()))?;
        Ok(Self::new(program.clone(), args.to_vec(), options))
    }

    fn call(&self, prompt: &str) -> Result<String> {
        run_piped(
            &self.program,
            &self.args,
            prompt,
            self.options.call_timeout(),
        )
        .map_err(|e| Error::Correction(format!("{}: {e}", self.program)))
    }
}

impl Corrector for CommandCorrector {
    fn correct(&self, markup: &str) -> Result<String> {
        let prompt = build_prompt(markup);
        let t0 = Instant::now();
        let response = self
            .options
            .retry("correction call", |_| true, || self.call(&prompt))?;
        log::info!(
            "Correction call: {:.1}ms ({} bytes in, {} bytes out)",
            t0.elapsed().as_secs_f64() * 1000.0,
            prompt.len(),
            response.len()
        );
        Ok(strip_commentary(&response))
    }
}

/// Run `program`, write `input` to its stdin and collect stdout. A non-zero
/// exit or an elapsed `timeout` is an error.
pub(crate) fn run_piped(
    program: &str,
    args: &[String],
    input: &str,
    timeout: Duration,
) -> io::Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        return Err(io::Error::other("child pipes unavailable"));
    };

    let input = input.to_string();
    let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));
    let reader = thread::spawn(move || {
        let mut out = String::new();
        stdout.read_to_string(&mut out).map(|_| out)
    });
    let err_reader = thread::spawn(move || {
        let mut out = String::new();
        let _ = stderr.read_to_string(&mut out);
        out
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{program} timed out after {timeout:?}"),
            ));
        }
        thread::sleep(Duration::from_millis(10));
    };

    // A child that exits without reading its input closes the pipe; that is
    // only an error if the exit status says so.
    let _ = writer.join();
    let output = reader
        .join()
        .map_err(|_| io::Error::other("stdout reader panicked"))??;
    let stderr = err_reader.join().unwrap_or_default();

    if !status.success() {
        return Err(io::Error::other(format!(
            "{program} exited with {status}: {}",
            stderr.trim()
        )));
    }
    Ok(output)
}
