use colored::*;
use std::io::{self, Write};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::escalation::{EscalationDecision, EscalationHandler, EscalationRequest};

/// Interactive terminal escalation handler with colored formatting
pub struct ConsolePrompt {
    permission_color: Color,
}

impl ConsolePrompt {
    /// Create a new ConsolePrompt with default colors
    pub fn new() -> Self {
        Self {
            permission_color: Color::Magenta,
        }
    }

    /// Create a new ConsolePrompt with a custom permission color
    pub fn with_color(permission_color: Color) -> Self {
        Self { permission_color }
    }

    fn prompt(&self, request: &EscalationRequest) -> io::Result<EscalationDecision> {
        println!();
        println!("{}", "─".repeat(60).yellow());
        println!(
            "{} The agent wants to run under permission: {}",
            "Permission Required".yellow().bold(),
            request.permission.color(self.permission_color).bold()
        );
        if let Some(ref description) = request.description {
            println!("  {}", description.bright_black());
        }
        println!();
        for pattern in &request.patterns {
            println!("  {}", pattern);
        }
        println!();
        println!("{}", "Options:".yellow());
        println!("  [y] Allow this time");
        println!("  [n] Deny");
        println!(
            "  [a] Always allow ({})",
            request.always_patterns.join(", ")
        );
        println!("{}", "─".repeat(60).yellow());
        print!("{} ", "Your choice (y/n/a):".yellow().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        let decision = match input.trim().to_lowercase().as_str() {
            "y" | "yes" => EscalationDecision::AllowOnce,
            "a" | "always" => EscalationDecision::AllowAlways,
            "n" | "no" => EscalationDecision::Deny,
            _ => {
                println!("{}", "Invalid choice. Defaulting to Deny.".red());
                EscalationDecision::Deny
            }
        };

        match decision {
            EscalationDecision::AllowOnce => {
                println!("{}", "✓ Allowed".green());
            }
            EscalationDecision::AllowAlways => {
                println!(
                    "{}",
                    format!("✓ Always allowing: {}", request.always_patterns.join(", ")).green()
                );
            }
            EscalationDecision::Deny => {
                println!("{}", "✗ Denied".red());
            }
        }
        println!();

        Ok(decision)
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscalationHandler for ConsolePrompt {
    async fn ask(&self, request: EscalationRequest) -> Result<EscalationDecision> {
        // Reading stdin is blocking; keep it off the async runtime
        let prompt = Self {
            permission_color: self.permission_color,
        };
        tokio::task::spawn_blocking(move || prompt.prompt(&request))
            .await
            .context("Prompt task failed")?
            .context("Failed to read decision from terminal")
    }
}
