//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Lumen CLI, including
//! live rendering of research progress events.

use crate::research::events::ProgressEvent;
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Lumen banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                r#"
   {}
   {}
   {}
"#,
                "█   █ █ █▄ ▄█ █▀▀ █▄ █".bright_yellow().bold(),
                "█   █ █ █ ▀ █ █▀▀ █ ▀█".yellow().bold(),
                "▀▀▀ ▀▀▀ ▀   ▀ ▀▀▀ ▀  ▀".yellow().bold(),
            );
            println!(
                "   {} {}\n",
                "Multi-agent deep research".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!(
                "\n   LUMEN - Multi-agent deep research v{}\n",
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }

    /// Render one research event
    ///
    /// Stage events become progress lines, report chunks are written through
    /// as they arrive.
    pub fn event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Status {
                message,
                stage,
                progress,
                ..
            }
            | ProgressEvent::Progress {
                message,
                stage,
                progress,
                ..
            } => {
                let percent = format!("[{:>3}%]", progress);
                if self.colored {
                    println!(
                        "  {} {:<15} {}",
                        percent.dimmed(),
                        stage.as_str().cyan(),
                        message
                    );
                } else {
                    println!("  {} {:<15} {}", percent, stage.as_str(), message);
                }
            }
            ProgressEvent::ReportStart { .. } => {
                self.header("Report");
                self.newline();
            }
            ProgressEvent::ReportChunk { data } => {
                print!("{}", data.chunk);
                io::stdout().flush().ok();
            }
            ProgressEvent::Complete { data } => {
                self.newline();
                self.complete(&format!(
                    "Research complete: {} follow-up loop(s), {} source(s)",
                    data.research_metadata.research_loops,
                    data.sources_gathered.len()
                ));
            }
            ProgressEvent::Error { error, .. } => {
                self.newline();
                self.error(error);
            }
        }
    }
}
