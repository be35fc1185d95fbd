pub mod cite;
pub mod project;
pub mod snapshot;
pub mod status;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn print(&self) {
        println!("{}: {}", self.command, if self.ok { "ok" } else { "issues" });
        for detail in &self.details {
            println!("  {detail}");
        }
        for issue in &self.issues {
            println!("  issue: {issue}");
        }
    }
}
