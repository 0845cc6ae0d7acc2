use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use vault::client::autosave::DEFAULT_AUTOSAVE_DELAY;
use vault::client::browser::export_file_name;
use vault::client::html::{format_size, preview};
use vault::client::{Autosaver, Draft, FileBrowser, NoteBrowser, SaveEvent, VaultClient};
use vault::services::files::FileSort;
use vault::services::notes::NoteSort;

const USAGE: &str = "Usage:
  vaultctl health
  vaultctl files list [--search TERM] [--sort KEY]
  vaultctl files upload PATH...
  vaultctl files show ID
  vaultctl files download ID [--out PATH]
  vaultctl files rename ID NEW_NAME
  vaultctl files delete ID --yes
  vaultctl notes list [--search TERM] [--sort KEY]
  vaultctl notes create [--title TITLE] [--content HTML]
  vaultctl notes show ID
  vaultctl notes edit ID
  vaultctl notes delete ID --yes
  vaultctl notes restore ID
  vaultctl notes duplicate ID
  vaultctl notes export ID [--out DIR]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let client = VaultClient::from_env()?;

    match args.first().map(String::as_str) {
        Some("health") => {
            let health = client.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Some("files") => run_files(client, &args[1..]).await?,
        Some("notes") => run_notes(client, &args[1..]).await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Value following `--name`, if present.
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == name)
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

fn id_arg(args: &[String]) -> Result<Uuid> {
    let raw = args.get(1).ok_or_else(|| anyhow!("missing ID\n{USAGE}"))?;
    Uuid::parse_str(raw).with_context(|| format!("{raw} is not a valid id"))
}

fn require_confirmation(args: &[String], what: &str) -> Result<()> {
    if !has_flag(args, "--yes") {
        bail!("refusing to delete {what} without --yes");
    }
    Ok(())
}

async fn run_files(client: VaultClient, args: &[String]) -> Result<()> {
    let mut browser = FileBrowser::new(client);

    match args.first().map(String::as_str) {
        Some("list") => {
            let refetched = browser
                .set_sort(FileSort::parse(flag(args, "--sort")))
                .await?;
            if !refetched {
                browser.refresh().await?;
            }
            browser.set_search(flag(args, "--search").unwrap_or_default());
            for file in browser.visible() {
                println!(
                    "{}  {:<40} {:>10}  {:<16} views {:<4} downloads {}",
                    file.id,
                    file.original_name,
                    format_size(file.file_size),
                    file.upload_date.format("%b %d, %Y"),
                    file.view_count,
                    file.download_count
                );
            }
        }
        Some("upload") => {
            let paths: Vec<PathBuf> = args[1..].iter().map(PathBuf::from).collect();
            if paths.is_empty() {
                bail!("no files given\n{USAGE}");
            }
            let uploaded = browser.upload_paths(&paths).await?;
            for file in &uploaded {
                println!("uploaded {} as {}", file.original_name, file.id);
            }
            if uploaded.len() < paths.len() {
                eprintln!(
                    "{} file(s) skipped (only PDF, PNG, JPG, DOC and DOCX up to 10 MB are accepted)",
                    paths.len() - uploaded.len()
                );
            }
        }
        Some("show") => {
            let file = browser.client().get_file(id_arg(args)?).await?;
            println!("{}", serde_json::to_string_pretty(&file)?);
        }
        Some("download") => {
            let file_id = id_arg(args)?;
            let out = flag(args, "--out").map(PathBuf::from);
            let (path, written) = browser.download_to(file_id, out.as_deref()).await?;
            println!("saved {} ({})", path.display(), format_size(written as i64));
        }
        Some("rename") => {
            let file_id = id_arg(args)?;
            let new_name = args
                .get(2)
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .ok_or_else(|| anyhow!("missing NEW_NAME\n{USAGE}"))?;
            match browser.rename(file_id, new_name).await {
                Ok(file) => println!("renamed to {}", file.original_name),
                Err(err) => bail!("Error renaming file: {err}"),
            }
        }
        Some("delete") => {
            let file_id = id_arg(args)?;
            require_confirmation(args, "file")?;
            println!("{}", browser.delete(file_id).await?);
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run_notes(client: VaultClient, args: &[String]) -> Result<()> {
    let mut browser = NoteBrowser::new(client);

    match args.first().map(String::as_str) {
        Some("list") => {
            let refetched = browser
                .set_sort(NoteSort::parse(flag(args, "--sort")))
                .await?;
            if !refetched {
                browser.refresh().await?;
            }
            browser.set_search(flag(args, "--search").unwrap_or_default());
            for note in browser.visible() {
                println!(
                    "{}  {:<30} {}  {}",
                    note.id,
                    note.title,
                    note.last_edited.format("%b %d, %Y %H:%M"),
                    preview(&note.content)
                );
            }
        }
        Some("create") => {
            let note = browser
                .create(flag(args, "--title"), flag(args, "--content"))
                .await?;
            println!("created {} \"{}\"", note.id, note.title);
        }
        Some("show") => {
            let note = browser.client().get_note(id_arg(args)?).await?;
            println!("{}\n\n{}", note.title, note.content);
        }
        Some("edit") => edit_note(&mut browser, id_arg(args)?).await?,
        Some("delete") => {
            let note_id = id_arg(args)?;
            require_confirmation(args, "note")?;
            println!("{}", browser.delete(note_id).await?);
        }
        Some("restore") => {
            let note = browser.restore(id_arg(args)?).await?;
            println!("restored \"{}\"", note.title);
        }
        Some("duplicate") => {
            let note = browser.duplicate(id_arg(args)?).await?;
            println!("created {} \"{}\"", note.id, note.title);
        }
        Some("export") => {
            let note = browser.client().get_note(id_arg(args)?).await?;
            let dir = flag(args, "--out").map(PathBuf::from).unwrap_or_default();
            let path = dir.join(export_file_name(&note));
            tokio::fs::write(&path, note.content.as_bytes())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("exported to {}", path.display());
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Line editor: every input line is appended to the content and rearms the autosave.
async fn edit_note(browser: &mut NoteBrowser, note_id: Uuid) -> Result<()> {
    let note = browser.client().get_note(note_id).await?;
    let delay = env::var("VAULT_AUTOSAVE_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_AUTOSAVE_DELAY);

    let (mut autosaver, mut events) = Autosaver::new(note_id, browser.client().clone(), delay);
    let mut draft = Draft {
        title: note.title,
        content: note.content,
    };

    println!(
        "Editing \"{}\". Lines are appended as paragraphs. Commands: :title TEXT, :save, :q",
        draft.title
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    ":q" => break,
                    ":save" => {
                        autosaver.flush(&draft).await?;
                    }
                    cmd if cmd.starts_with(":title ") => {
                        draft.title = cmd[":title ".len()..].trim().to_string();
                        autosaver.edit(draft.clone());
                    }
                    _ => {
                        draft.content.push_str(&format!("<p>{line}</p>"));
                        autosaver.edit(draft.clone());
                    }
                }
            }
            Some(event) = events.recv() => report(event),
        }
    }

    if autosaver.has_pending() {
        autosaver.flush(&draft).await?;
    }
    while let Ok(event) = events.try_recv() {
        report(event);
    }
    browser.refresh().await?;
    Ok(())
}

fn report(event: SaveEvent) {
    match event {
        SaveEvent::Saved(note) => println!("saved \"{}\"", note.title),
        SaveEvent::Failed(message) => eprintln!("Error saving note: {message}"),
    }
}
