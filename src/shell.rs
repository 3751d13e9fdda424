//! Interactive front end. Each line is parsed into a [`ShellCommand`] and
//! dispatched to one handler; the handler's reply is printed back.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::clients::OrderDeskClient;
use crate::domain::{format_rupees, Attachment, FormField, OrderForm, PaymentPreview};
use crate::error::SubmissionError;
use crate::storage::{export_file_name, NO_ORDERS_PLACEHOLDER};

pub const DEFAULT_RECENT_LIMIT: usize = 10;
const PASSWORD_PROMPT: &str = "Enter admin password to confirm: ";

const HELP: &str = "\
Commands:
  set <field> <value>   edit the order form (name, guardian, phone, sensor,
                        quantity, pickup, notes, emergency)
  attach <path>         attach the payment screenshot
  detach                remove attached files
  form                  show the current form
  quote                 show the amount to pay
  submit                submit the order
  summary               order counters
  recent [n]            most recent orders
  export [path]         write all cached orders as CSV
  catalog               sensors and pickup locations
  status                refresh whether orders are being accepted
  admin on|off          enable or disable new orders (asks for password)
  help                  this text
  quit                  leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Set(FormField, String),
    Attach(PathBuf),
    Detach,
    Form,
    Quote,
    Submit,
    Summary,
    Recent(Option<usize>),
    Export(Option<PathBuf>),
    Catalog,
    Status,
    Admin(bool),
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        match head.to_ascii_lowercase().as_str() {
            "set" => {
                let (field, value) = match rest.split_once(char::is_whitespace) {
                    Some((field, value)) => (field, value.trim()),
                    None => (rest, ""),
                };
                Ok(ShellCommand::Set(field.parse()?, value.to_string()))
            }
            "attach" if !rest.is_empty() => Ok(ShellCommand::Attach(PathBuf::from(rest))),
            "attach" => Err("Usage: attach <path>".to_string()),
            "detach" => Ok(ShellCommand::Detach),
            "form" => Ok(ShellCommand::Form),
            "quote" => Ok(ShellCommand::Quote),
            "submit" => Ok(ShellCommand::Submit),
            "summary" => Ok(ShellCommand::Summary),
            "recent" if rest.is_empty() => Ok(ShellCommand::Recent(None)),
            "recent" => rest
                .parse()
                .map(|n| ShellCommand::Recent(Some(n)))
                .map_err(|_| "Usage: recent [n]".to_string()),
            "export" => Ok(ShellCommand::Export((!rest.is_empty()).then(|| PathBuf::from(rest)))),
            "catalog" => Ok(ShellCommand::Catalog),
            "status" => Ok(ShellCommand::Status),
            "admin" => match rest {
                "on" => Ok(ShellCommand::Admin(true)),
                "off" => Ok(ShellCommand::Admin(false)),
                _ => Err("Usage: admin on|off".to_string()),
            },
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "exit" => Ok(ShellCommand::Quit),
            "" => Err(String::new()),
            other => Err(format!("Unknown command '{}'. Type 'help'.", other)),
        }
    }
}

/// What to print after a command, and whether the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellReply {
    pub text: String,
    pub quit: bool,
}

impl ShellReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }
}

/// Display settings fixed for the session.
#[derive(Debug, Clone)]
pub struct ShellSettings {
    pub upi_id: String,
    pub run_text: String,
    pub recent_limit: usize,
}

/// The order page: holds the draft form and its attachments between commands.
pub struct Shell {
    client: OrderDeskClient,
    settings: ShellSettings,
    draft: OrderForm,
    attachments: Vec<Attachment>,
    preview: Option<PaymentPreview>,
}

impl Shell {
    pub fn new(client: OrderDeskClient, settings: ShellSettings) -> Self {
        Self {
            client,
            settings,
            draft: OrderForm::default(),
            attachments: Vec::new(),
            preview: None,
        }
    }

    #[cfg(test)]
    pub fn draft(&self) -> &OrderForm {
        &self.draft
    }

    #[cfg(test)]
    pub fn preview(&self) -> Option<PaymentPreview> {
        self.preview
    }

    pub fn banner(&self) -> String {
        format!(
            "Sensor group order ({})\nType 'help' for commands.",
            self.settings.run_text
        )
    }

    pub async fn run<R, W>(mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output.write_all(format!("{}\n> ", self.banner()).as_bytes()).await?;
        output.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let command = match line.parse::<ShellCommand>() {
                Ok(command) => command,
                Err(message) => {
                    if !message.is_empty() {
                        output.write_all(format!("{}\n", message).as_bytes()).await?;
                    }
                    output.write_all(b"> ").await?;
                    output.flush().await?;
                    continue;
                }
            };

            // Collected just in time; never kept past this command.
            let password = if let ShellCommand::Admin(_) = command {
                output.write_all(PASSWORD_PROMPT.as_bytes()).await?;
                output.flush().await?;
                lines.next_line().await?
            } else {
                None
            };

            let reply = self.dispatch(command, password).await;
            if !reply.text.is_empty() {
                output.write_all(format!("{}\n", reply.text).as_bytes()).await?;
            }
            if reply.quit {
                break;
            }
            output.write_all(b"> ").await?;
            output.flush().await?;
        }
        output.flush().await
    }

    pub async fn dispatch(&mut self, command: ShellCommand, password: Option<String>) -> ShellReply {
        debug!(command = command_name(&command), "Dispatching command");
        match command {
            ShellCommand::Set(field, value) => self.handle_set(field, value),
            ShellCommand::Attach(path) => self.handle_attach(path).await,
            ShellCommand::Detach => {
                self.attachments.clear();
                ShellReply::text("Attachments removed")
            }
            ShellCommand::Form => ShellReply::text(self.render_form()),
            ShellCommand::Quote => ShellReply::text(self.render_preview()),
            ShellCommand::Submit => self.handle_submit().await,
            ShellCommand::Summary => self.handle_summary().await,
            ShellCommand::Recent(limit) => self.handle_recent(limit).await,
            ShellCommand::Export(path) => self.handle_export(path).await,
            ShellCommand::Catalog => ShellReply::text(self.render_catalog()),
            ShellCommand::Status => self.handle_status().await,
            ShellCommand::Admin(desired) => self.handle_admin(desired, password).await,
            ShellCommand::Help => ShellReply::text(HELP),
            ShellCommand::Quit => ShellReply {
                text: String::new(),
                quit: true,
            },
        }
    }

    fn handle_set(&mut self, field: FormField, value: String) -> ShellReply {
        self.draft.set(field, value);
        if matches!(field, FormField::Quantity | FormField::SensorType) {
            self.preview = self
                .client
                .catalog()
                .preview(&self.draft.sensor_type, &self.draft.quantity);
            return ShellReply::text(self.render_preview());
        }
        ShellReply::text(format!("{} updated", field))
    }

    async fn handle_attach(&mut self, path: PathBuf) -> ShellReply {
        match Attachment::from_path(&path).await {
            Ok(attachment) => {
                self.attachments.push(attachment);
                ShellReply::text(format!("Attached {}", path.display()))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "File reading failed");
                ShellReply::text(format!("File reading failed: {}", e))
            }
        }
    }

    async fn handle_submit(&mut self) -> ShellReply {
        match self.client.submit_order(&self.draft, &self.attachments).await {
            Ok(confirmation) => {
                self.draft = OrderForm::default();
                self.attachments.clear();
                self.preview = None;
                ShellReply::text(format!("Order submitted successfully!\n{}", confirmation))
            }
            Err(SubmissionError::Validation(errors)) => {
                let mut text = String::from("Please fix the following:");
                for error in errors {
                    let _ = write!(text, "\n  {}", error);
                }
                ShellReply::text(text)
            }
            Err(e) => ShellReply::text(format!("Error: {}", e)),
        }
    }

    async fn handle_summary(&self) -> ShellReply {
        match self.client.desk().summary(Utc::now()).await {
            Ok(summary) => ShellReply::text(summary.to_string()),
            Err(e) => ShellReply::text(format!("Error: {}", e)),
        }
    }

    async fn handle_recent(&self, limit: Option<usize>) -> ShellReply {
        let limit = limit.unwrap_or(self.settings.recent_limit);
        match self.client.recent_orders(limit).await {
            Ok(views) if views.is_empty() => ShellReply::text(NO_ORDERS_PLACEHOLDER),
            Ok(views) => ShellReply::text(
                views
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            ),
            Err(e) => ShellReply::text(format!("Error: {}", e)),
        }
    }

    async fn handle_export(&self, path: Option<PathBuf>) -> ShellReply {
        let csv = match self.client.desk().export_orders().await {
            Ok(csv) => csv,
            Err(e) => return ShellReply::text(format!("Error: {}", e)),
        };
        let path = path.unwrap_or_else(|| PathBuf::from(export_file_name(Utc::now())));
        let rows = csv.lines().count().saturating_sub(1);
        match tokio::fs::write(&path, csv).await {
            Ok(()) => ShellReply::text(format!("Exported {} orders to {}", rows, path.display())),
            Err(e) => ShellReply::text(format!("Export failed: {}", e)),
        }
    }

    async fn handle_status(&self) -> ShellReply {
        match self.client.fetch_status().await {
            Ok(enabled) => ShellReply::text(status_line(enabled)),
            Err(e) => ShellReply::text(format!("Error: {}", e)),
        }
    }

    async fn handle_admin(&self, desired: bool, password: Option<String>) -> ShellReply {
        let outcome = self.client.set_orders_enabled(desired, password).await;
        let toggle = format!("Accepting orders: {}", if outcome.shown { "on" } else { "off" });
        match outcome.error {
            None => ShellReply::text(format!("{}\n{}", toggle, status_line(outcome.shown))),
            Some(e) => ShellReply::text(format!("Error: {}\n{}", e, toggle)),
        }
    }

    fn render_preview(&self) -> String {
        match self.preview {
            None => "Enter a quantity to see the amount to pay".to_string(),
            Some(preview) => {
                let mut text = format!("Total amount: {}", format_rupees(preview.total));
                if let Some(savings) = preview.savings {
                    let _ = write!(text, "\nYou save: {}", format_rupees(savings));
                }
                let _ = write!(text, "\nPay via UPI to: {}", self.settings.upi_id);
                text
            }
        }
    }

    fn render_form(&self) -> String {
        let mut text = String::new();
        for field in FormField::ALL {
            let marker = if field.is_required() { "*" } else { " " };
            let _ = writeln!(text, "{}{:<10} {}", marker, field.as_str(), self.draft.get(field));
        }
        let _ = write!(text, "*screenshot {} file(s) attached", self.attachments.len());
        text
    }

    fn render_catalog(&self) -> String {
        let catalog = self.client.catalog();
        let mut text = String::from("Sensors:");
        for sensor in catalog.sensors() {
            let _ = write!(text, "\n  {:<12} {}", sensor.key, sensor.label());
        }
        text.push_str("\nPickup locations:");
        for location in catalog.pickup_locations() {
            let _ = write!(text, "\n  {:<12} {}", location.key, location.label);
        }
        let _ = write!(text, "\nNext run: {}", self.settings.run_text);
        text
    }
}

fn status_line(enabled: bool) -> &'static str {
    if enabled {
        "Orders are open"
    } else {
        "Currently not accepting orders"
    }
}

fn command_name(command: &ShellCommand) -> &'static str {
    match command {
        ShellCommand::Set(..) => "set",
        ShellCommand::Attach(_) => "attach",
        ShellCommand::Detach => "detach",
        ShellCommand::Form => "form",
        ShellCommand::Quote => "quote",
        ShellCommand::Submit => "submit",
        ShellCommand::Summary => "summary",
        ShellCommand::Recent(_) => "recent",
        ShellCommand::Export(_) => "export",
        ShellCommand::Catalog => "catalog",
        ShellCommand::Status => "status",
        ShellCommand::Admin(_) => "admin",
        ShellCommand::Help => "help",
        ShellCommand::Quit => "quit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "set name Asha Rao".parse::<ShellCommand>(),
            Ok(ShellCommand::Set(FormField::Name, "Asha Rao".into()))
        );
        assert_eq!(
            "set notes".parse::<ShellCommand>(),
            Ok(ShellCommand::Set(FormField::Notes, String::new()))
        );
        assert_eq!("admin off".parse::<ShellCommand>(), Ok(ShellCommand::Admin(false)));
        assert_eq!("recent".parse::<ShellCommand>(), Ok(ShellCommand::Recent(None)));
        assert_eq!("recent 3".parse::<ShellCommand>(), Ok(ShellCommand::Recent(Some(3))));
        assert_eq!(
            "export out.csv".parse::<ShellCommand>(),
            Ok(ShellCommand::Export(Some(PathBuf::from("out.csv"))))
        );
        assert_eq!("  QUIT ".parse::<ShellCommand>(), Ok(ShellCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!("set email a@b.c".parse::<ShellCommand>().is_err());
        assert!("admin maybe".parse::<ShellCommand>().is_err());
        assert!("attach".parse::<ShellCommand>().is_err());
        assert!("recent lots".parse::<ShellCommand>().is_err());
        assert_eq!("".parse::<ShellCommand>(), Err(String::new()));
    }
}
