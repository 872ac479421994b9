// Terminal output for stagehand commands
// Progress goes to stderr; job log lines go to stdout so they can be piped

const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy)]
enum Tone {
    Good,
    Bad,
    Warn,
    Note,
    Title,
    Plain,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Good => "\x1b[32m",
            Tone::Bad => "\x1b[31m",
            Tone::Warn => "\x1b[33m",
            Tone::Note => "\x1b[36m",
            Tone::Title => "\x1b[1;34m",
            Tone::Plain => "\x1b[1m",
        }
    }
}

fn paint(tone: Tone, text: &str) -> String {
    format!("{}{}{}", tone.code(), text, RESET)
}

fn mark(tone: Tone, symbol: &str, message: &str) {
    eprintln!("  {} {}", paint(tone, symbol), message);
}

/// Right-aligned verb, cargo style: `  Resolving job.yaml`
pub fn status(verb: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}{} {}", verb, RESET, message);
}

pub fn success(message: &str) {
    mark(Tone::Good, "\u{2713}", message);
}

pub fn failure(message: &str) {
    mark(Tone::Bad, "\u{2717}", message);
}

/// A validation item that passed
pub fn check(message: &str) {
    mark(Tone::Good, "-", message);
}

pub fn warning(message: &str) {
    mark(Tone::Warn, "!", message);
}

pub fn info(message: &str) {
    mark(Tone::Note, "i", message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", paint(Tone::Bad, "error:"), message);
}

/// First line printed for a job run
pub fn job_banner(name: &str, version: &str, id: &str) {
    eprintln!("{}", paint(Tone::Plain, &format!("==> Job '{}' {} ({})", name, version, id)));
}

pub fn stage_header(name: &str, version: &str, total_steps: usize) {
    let steps = if total_steps == 1 { "step" } else { "steps" };
    eprintln!(
        "{} '{}' {} ({} {})",
        paint(Tone::Title, "  Stage"),
        name,
        version,
        total_steps,
        steps
    );
}

/// Closing line of a stage, green or red by outcome
pub fn stage_summary(line: &str, success: bool) {
    let tone = if success { Tone::Good } else { Tone::Bad };
    eprintln!("{}", paint(tone, line));
}

/// One line of job log
pub fn log_line(line: &str) {
    println!("        | {}", line);
}
