use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use plughost_host::{
    DispatchOutcome, HostOptions, MemorySettings, OfflineTransport, PluginHost,
};
use plughost_plugin_sdk::{HookEvent, Services, Ui};

use crate::builtin;

/// Terminal UI for the REPL.
struct ConsoleUi {
    windows: Mutex<BTreeSet<String>>,
    recipient: String,
}

impl Ui for ConsoleUi {
    fn cons_show(&self, message: &str) {
        println!("{message}");
    }

    fn cons_alert(&self) {
        print!("\x07");
        let _ = io::stdout().flush();
    }

    fn notify(&self, message: &str, _timeout_ms: u64, category: Option<&str>) {
        match category {
            Some(category) => println!("[notify:{category}] {message}"),
            None => println!("[notify] {message}"),
        }
    }

    fn win_create(&self, tag: &str) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string());
        println!("(window '{tag}' created, type /win {tag} <text> to write to it)");
    }

    fn win_exists(&self, tag: &str) -> bool {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tag)
    }

    fn current_recipient(&self) -> Option<String> {
        Some(self.recipient.clone())
    }
}

/// Run the interactive REPL.
pub async fn run_repl(extra_plugins: Vec<String>, recipient: String) -> Result<()> {
    let config = plughost_config::load_config().unwrap_or_default();

    let services = Services {
        ui: Arc::new(ConsoleUi {
            windows: Mutex::new(BTreeSet::new()),
            recipient: recipient.clone(),
        }),
        transport: Arc::new(OfflineTransport),
        settings: Arc::new(MemorySettings::from_seed(config.settings.clone())),
    };
    let host = PluginHost::new(HostOptions::from_config(&config), services);

    for name in config.plugins.autoload.iter().chain(extra_plugins.iter()) {
        load_builtin(&host, name).await;
    }
    host.on_start().await;

    println!("plughost repl (sending to {recipient})");
    println!("Type /plugins, /timers, /complete <text>, /help <command>, or 'exit' to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            // EOF (Ctrl+D)
            println!();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        if input.starts_with('/') {
            run_command(&host, input).await;
        } else {
            send_message(&host, &recipient, input).await;
        }
    }

    host.shutdown().await;
    println!("Goodbye!");
    Ok(())
}

async fn load_builtin(host: &PluginHost, name: &str) {
    match builtin::create(name) {
        Some(plugin) => {
            if let Err(e) = host.load(plugin).await {
                println!("Failed to load {name}: {e}");
            }
        }
        None => {
            warn!(plugin = name, "No such built-in plugin");
            println!("No such plugin: {name}");
        }
    }
}

async fn run_command(host: &PluginHost, input: &str) {
    let mut words = input.split_whitespace();
    let command = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();

    match (command, rest.as_slice()) {
        ("/plugins", []) => {
            let loaded = host.loaded_plugins().await;
            if loaded.is_empty() {
                println!("No plugins loaded.");
            } else {
                println!("Loaded plugins: {}", loaded.join(", "));
            }
            println!("Built-in: {}", builtin::NAMES.join(", "));
        }
        ("/plugins", ["load", name]) => {
            load_builtin(host, name).await;
        }
        ("/plugins", ["unload", name]) => match host.unload(name).await {
            Ok(()) => println!("Unloaded {name}"),
            Err(e) => println!("{e}"),
        },
        ("/timers", []) => {
            for timer in host.timers() {
                println!(
                    "{:<10} {:<12} every {:>4}s  fired {} (faulted {})",
                    timer.owner,
                    timer.name,
                    timer.interval.as_secs(),
                    timer.fired,
                    timer.faulted
                );
            }
        }
        ("/complete", _) => {
            let partial = input.strip_prefix("/complete").unwrap_or_default().trim_start();
            for candidate in host.autocomplete(partial).await {
                println!("{candidate}");
            }
        }
        ("/help", [name]) => match host.command_help(name).await {
            Some(help) => {
                for line in &help.synopsis {
                    println!("{line}");
                }
                if !help.description.is_empty() {
                    println!("\n{}", help.description);
                }
                for (arg, description) in &help.arguments {
                    println!("  {arg:<16} {description}");
                }
                for example in &help.examples {
                    println!("  e.g. {example}");
                }
            }
            None => println!("No help for {name}"),
        },
        ("/win", [tag, ..]) => {
            let text = rest[1..].join(" ");
            match host.win_process_line(tag, &text).await {
                Ok(true) => {}
                Ok(false) => println!("No plugin window {tag}"),
                Err(e) => println!("{e}"),
            }
        }
        ("/features", []) => {
            for feature in host.disco_features().await {
                println!("{feature}");
            }
        }
        _ => {
            if !host.handle_line(input).await {
                println!("Unknown command: {command}");
            }
        }
    }
}

async fn send_message(host: &PluginHost, recipient: &str, message: &str) {
    let outgoing = host
        .dispatch(HookEvent::PreChatMessageSend {
            barejid: recipient.to_string(),
            message: message.to_string(),
        })
        .await;

    let message = match outgoing {
        DispatchOutcome::Cancelled { plugin } => {
            println!("(message not sent, cancelled by {plugin})");
            return;
        }
        other => other.into_payload().unwrap_or_else(|| message.to_string()),
    };

    println!("me -> {recipient}: {message}");
    host.dispatch(HookEvent::PostChatMessageSend {
        barejid: recipient.to_string(),
        message,
    })
    .await;
}
