use parsechain::{ExtractionVerbose, Options, Value};

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

/// Which report sections to print.
#[derive(Debug, Clone, Copy)]
pub struct Sections {
    pub nodes: bool,
    pub trace: bool,
}

/// Nodes listed per provenance path before eliding the rest.
const NODES_PER_PATH: usize = 5;

pub fn print_run(res: &ExtractionVerbose, sections: Sections, options: &Options, color: bool) {
    let palette = ansi::Palette::new(color);
    eprintln!("\n{}", palette.bold(palette.paint(format!("⚙  Chain: {}", res.chain), ansi::CYAN)));

    if sections.trace {
        eprintln!("\n{}", palette.paint("━━━ Links ━━━", ansi::GRAY));
        print_trace(res, &palette);
    }

    if sections.nodes {
        eprintln!("\n{}", palette.paint("━━━ Nodes ━━━", ansi::GRAY));
        print_nodes(res, options, &palette);
    }

    eprintln!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    eprintln!(
        "  Total: {}  │  Parse: {}  │  Apply: {}",
        palette.paint(format!("{:?}", res.elapsed), ansi::GREEN),
        palette.paint(format!("{:?}", res.details.parse), ansi::CYAN),
        palette.dim(format!("{:?}", res.details.metrics.total)),
    );
    if let Some(step) = res.details.metrics.slowest() {
        eprintln!("  Slowest link: {} {}", palette.paint(&step.link, ansi::BLUE), palette.dim(format!("{:?}", step.duration)));
    }
    eprintln!();
}

fn print_trace(res: &ExtractionVerbose, palette: &ansi::Palette) {
    for (idx, step) in res.details.metrics.steps.iter().enumerate() {
        let marker = if step.node_like { palette.paint("◆", ansi::GREEN) } else { palette.dim("◇") };
        eprintln!(
            "  {} {} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            marker,
            palette.paint(&step.link, ansi::BLUE),
            palette.dim(format!("{:?}", step.duration)),
        );
        eprintln!("      {} {}", palette.dim("→"), step.output);
    }
    let skipped = res.details.metrics.skipped;
    if skipped > 0 {
        eprintln!("  {}", palette.paint(format!("… {skipped} links skipped after null"), ansi::YELLOW));
    }
}

fn print_nodes(res: &ExtractionVerbose, options: &Options, palette: &ansi::Palette) {
    if res.details.provenance.is_empty() {
        eprintln!("{}", palette.dim("  No output paths"));
        return;
    }

    for (path, nodes) in &res.details.provenance {
        let label = if path.is_empty() { "(root)" } else { path.as_str() };
        let items: Vec<&Value> = match nodes {
            Value::List(items) => items.iter().collect(),
            other => vec![other],
        };
        eprintln!(
            "  {} {}",
            palette.bold(palette.paint(label, ansi::YELLOW)),
            palette.dim(format!("({} nodes)", items.len()))
        );
        for node in items.iter().take(NODES_PER_PATH) {
            eprintln!("    {}", node.preview(options.preview_len));
        }
        if items.len() > NODES_PER_PATH {
            eprintln!("    {}", palette.dim(format!("... +{} more", items.len() - NODES_PER_PATH)));
        }
    }
}
