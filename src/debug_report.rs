use translit::{PassMetrics, Position, RunResult, Transliterator};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(translit: &Transliterator, input: &str, run: &RunResult, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Transliterating: \"{}\"", input), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    print_rule_summary(translit, &palette);

    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    println!("  {}", palette.bold(palette.paint(&run.output, ansi::GREEN)));

    println!("\n{}", palette.paint("━━━ Matcher ━━━", ansi::GRAY));
    print_pass(translit, &run.metrics.pass, &palette);

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Matcher: {}",
        palette.paint(format!("{:?}", run.metrics.total), ansi::GREEN),
        palette.paint(format!("{:?}", run.metrics.pass.duration), ansi::CYAN),
    );
    println!();
}

/// Type `input` one char at a time, printing the buffer after each key:
/// committed text, then `{` at the start of uncommitted text, then `|` at the
/// cursor.
pub fn print_keyboard(translit: &Transliterator, input: &str, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⌨  Typing: \"{}\"", input), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    print_rule_summary(translit, &palette);

    println!("\n{}", palette.paint("━━━ Keystrokes ━━━", ansi::GRAY));
    let mut buf: Vec<char> = Vec::new();
    let mut pos = Position::default();
    let mut total = PassMetrics::default();
    let mut scratch = [0u8; 4];

    for c in input.chars() {
        let (finished, pass) =
            translit.transliterate_incremental_with_metrics(&mut buf, &mut pos, Some(c.encode_utf8(&mut scratch)));
        println!(
            "  {} {}  {}",
            palette.paint(format!("{:>6}", format!("{c:?}")), ansi::BLUE),
            fmt_buffer(&buf, &pos, &palette),
            if finished { String::new() } else { palette.paint("… pending", ansi::YELLOW) },
        );
        total.absorb(pass);
    }

    total.absorb(translit.finish_transliteration_with_metrics(&mut buf, &mut pos));
    println!("  {} {}", palette.paint(format!("{:>6}", "finish"), ansi::BLUE), fmt_buffer(&buf, &pos, &palette));

    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    println!("  {}", palette.bold(palette.paint(buf.iter().collect::<String>(), ansi::GREEN)));

    println!("\n{}", palette.paint("━━━ Matcher (all keystrokes) ━━━", ansi::GRAY));
    print_pass(translit, &total, &palette);
    println!();
}

fn print_rule_summary(translit: &Transliterator, palette: &ansi::Palette) {
    let rules = translit.rules();
    println!(
        "  {} {}  {} {}  {} {}",
        palette.dim("id:"),
        palette.paint(translit.id(), ansi::CYAN),
        palette.dim("rules:"),
        palette.paint(rules.len().to_string(), ansi::YELLOW),
        palette.dim("max context:"),
        palette.paint(translit.max_context_length().to_string(), ansi::YELLOW),
    );
    if let Some(index) = rules.index() {
        println!("  {} {}", palette.dim("populated buckets:"), palette.paint(index.populated_buckets().to_string(), ansi::YELLOW));
    }
}

fn print_pass(translit: &Transliterator, pass: &PassMetrics, palette: &ansi::Palette) {
    println!(
        "  Steps: {}  │  Replacements: {}  │  Copied: {}",
        palette.paint(pass.steps.to_string(), ansi::YELLOW),
        palette.paint(pass.replacements.to_string(), ansi::GREEN),
        palette.dim(pass.copied.to_string()),
    );
    if pass.budget_exhausted {
        println!("  {}", palette.paint("step budget exhausted; rules may be cycling", ansi::YELLOW));
    }

    let mut counts: Vec<(usize, usize)> = Vec::new();
    for &id in &pass.fired {
        match counts.iter_mut().find(|(rule, _)| *rule == id) {
            Some((_, n)) => *n += 1,
            None => counts.push((id, 1)),
        }
    }
    counts.sort_unstable();

    for (id, n) in counts {
        let Some(rule) = translit.rules().rule(id) else { continue };
        println!(
            "  {} {} {}",
            palette.paint(format!("[{}]", id), ansi::GRAY),
            palette.paint(rule.to_string(), ansi::CYAN),
            palette.dim(format!("×{n}")),
        );
    }
}

fn fmt_buffer(buf: &[char], pos: &Position, palette: &ansi::Palette) -> String {
    let committed: String = buf[..pos.start].iter().collect();
    let scanned: String = buf[pos.start..pos.cursor].iter().collect();
    let pending: String = buf[pos.cursor..pos.limit].iter().collect();
    format!(
        "{}{}{}{}{}",
        palette.paint(committed, ansi::GREEN),
        palette.dim("{"),
        scanned,
        palette.dim("|"),
        palette.paint(pending, ansi::YELLOW),
    )
}
