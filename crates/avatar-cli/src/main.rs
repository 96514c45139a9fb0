mod config;

use anyhow::{bail, Context, Result};
use avatar_core::{
    classify, profiles, AvatarChecker, AvatarReport, EyeOpenEncoding, ProviderKind,
    RequestedAttributes,
};
use avatar_store::{Item, ItemSource, JsonLineStore};
use clap::{ArgGroup, Args, Parser, Subcommand};
use config::Config;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::task::JoinSet;

/// Exit status for a photo that was evaluated and rejected.
const EXIT_REJECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "avatar", about = "Avatar photo acceptability checks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an image reference (local file, direct URL or search-page URL)
    Classify {
        /// Path or URL
        reference: String,
    },
    /// Evaluate one face-analysis response against a policy
    Evaluate {
        /// Provider response JSON ("-" for stdin)
        #[arg(short, long)]
        response: PathBuf,
        /// Image reference the response belongs to (defaults to the response path; required with "-r -")
        #[arg(short, long)]
        image: Option<String>,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Evaluate many responses concurrently, one report line per file
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// List the built-in policy profiles
    Profiles,
    /// Manage stored avatar items
    Items {
        #[command(subcommand)]
        command: ItemCommands,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// List stored items
    List,
    /// Add an item by URL or local file
    #[command(group(ArgGroup::new("source").required(true).args(["url", "file"])))]
    Add {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        file: Option<String>,
        /// Expected outcome, for labelled sets
        #[arg(long)]
        should_pass: Option<bool>,
    },
    /// Remove an item
    Remove { id: u64 },
    /// Evaluate a response for a stored item and record the result
    Check {
        id: u64,
        #[arg(short, long)]
        response: PathBuf,
        #[command(flatten)]
        policy: PolicyArgs,
    },
}

/// Policy selection; each flag overrides its `AVATAR_*` variable.
#[derive(Args, Debug, Default)]
struct PolicyArgs {
    /// Built-in policy profile
    #[arg(long, conflicts_with = "policy")]
    profile: Option<String>,
    /// TOML policy profile file
    #[arg(long)]
    policy: Option<PathBuf>,
    /// Response layout: iai or generic
    #[arg(long)]
    provider: Option<ProviderKind>,
    /// Eye-open polarity: zero-open or zero-closed
    #[arg(long)]
    eye_encoding: Option<EyeOpenEncoding>,
    /// Stop at the first policy violation
    #[arg(long)]
    fail_fast: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Classify { reference } => {
            println!("{}", serde_json::to_string_pretty(&classify(&reference))?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Evaluate { response, image, policy } => {
            let checker = build_checker(&config, &policy)?;
            let image = image_reference(&response, image)?;
            let body = read_response(&response).await?;
            let report = checker
                .check(&classify(&image), &body)
                .with_context(|| format!("malformed response {}", response.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(exit_status(&report))
        }
        Commands::Batch { files, policy } => {
            let checker = build_checker(&config, &policy)?;
            run_batch(checker, files).await
        }
        Commands::Profiles => {
            for profile in profiles::list() {
                let masks: Vec<_> = profile.policy.allowed_mask_types.iter().map(|m| m.label()).collect();
                println!("{:<12} {}", profile.name, profile.description);
                println!("{:<12} masks allowed: {}", "", masks.join(", "));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Items { command } => run_items(&config, command).await,
    }
}

/// Resolve the policy (flags first, then environment) and pair it with the
/// matching provider adapter.
fn build_checker(config: &Config, args: &PolicyArgs) -> Result<AvatarChecker> {
    let profile = match (&args.policy, &args.profile) {
        (Some(path), _) => avatar_core::Profile::from_file(path)?,
        (None, Some(name)) => profiles::require(name)?.clone(),
        (None, None) => config.load_profile()?,
    };

    let mut policy = profile.policy;
    if args.fail_fast {
        policy.fail_fast = true;
    } else if let Some(fail_fast) = config.fail_fast {
        policy.fail_fast = fail_fast;
    }

    let provider = args.provider.unwrap_or(config.provider);
    let eye_encoding = args.eye_encoding.unwrap_or(config.eye_encoding);
    let requested = RequestedAttributes::for_policy(&policy);
    tracing::info!(
        profile = %profile.name,
        ?provider,
        attributes = %requested.attribute_types(),
        max_faces = requested.max_faces,
        fail_fast = policy.fail_fast,
        "policy selected"
    );

    let checker = AvatarChecker::new(provider.adapter(requested, eye_encoding), policy)
        .with_context(|| format!("invalid policy in profile '{}'", profile.name))?;
    Ok(checker)
}

/// The image a response belongs to: `--image`, else the response path.
/// A response read from stdin has no path to stand in for the image.
fn image_reference(response: &Path, image: Option<String>) -> Result<String> {
    match image {
        Some(image) => Ok(image),
        None if response == Path::new("-") => bail!("--image is required when the response is read from stdin"),
        None => Ok(response.display().to_string()),
    }
}

async fn read_response(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut body = String::new();
        tokio::io::stdin()
            .read_to_string(&mut body)
            .await
            .context("failed to read response from stdin")?;
        return Ok(body);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read response {}", path.display()))
}

async fn evaluate_file(checker: &AvatarChecker, path: &Path) -> Result<AvatarReport> {
    let body = read_response(path).await?;
    let reference = classify(&path.display().to_string());
    let report = checker
        .check(&reference, &body)
        .with_context(|| format!("malformed response {}", path.display()))?;
    Ok(report)
}

async fn run_batch(checker: AvatarChecker, files: Vec<PathBuf>) -> Result<ExitCode> {
    let checker = Arc::new(checker);
    let mut tasks = JoinSet::new();
    for (index, path) in files.into_iter().enumerate() {
        let checker = Arc::clone(&checker);
        tasks.spawn(async move {
            let result = evaluate_file(&checker, &path).await;
            (index, path, result)
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("batch task failed")?);
    }
    results.sort_by_key(|(index, _, _)| *index);

    let (mut rejected, mut failed) = (0usize, 0usize);
    for (_, path, result) in &results {
        let file = path.display().to_string();
        let line = match result {
            Ok(report) => {
                if !report.has_valid_avatar {
                    rejected += 1;
                }
                serde_json::json!({ "file": file, "report": report })
            }
            Err(e) => {
                failed += 1;
                let error = format!("{e:#}");
                tracing::error!(file = %file, error = %error, "evaluation failed");
                serde_json::json!({ "file": file, "error": error })
            }
        };
        println!("{line}");
    }
    tracing::info!(total = results.len(), rejected, failed, "batch complete");

    if failed > 0 {
        bail!("{failed} of {} responses could not be evaluated", results.len());
    }
    Ok(if rejected > 0 { ExitCode::from(EXIT_REJECTED) } else { ExitCode::SUCCESS })
}

async fn run_items(config: &Config, command: ItemCommands) -> Result<ExitCode> {
    let store: JsonLineStore<Item> = JsonLineStore::open(config.store_path.clone())
        .with_context(|| format!("failed to open item store {}", config.store_path.display()))?;

    match command {
        ItemCommands::List => {
            let items = store.read_all()?;
            if items.is_empty() {
                println!("No items stored");
            }
            for item in items {
                let status = match (item.passed, item.agrees()) {
                    (None, _) => "unchecked",
                    (Some(_), Some(false)) => "mismatch",
                    (Some(true), _) => "pass",
                    (Some(false), _) => "fail",
                };
                println!("{:>5}  {:<9}  {}", item.id, status, item.reference().target());
            }
        }
        ItemCommands::Add { url, file, should_pass } => {
            let source = match (url, file) {
                (Some(url), _) => ItemSource::Url(url),
                (None, Some(file)) => ItemSource::File(file),
                (None, None) => bail!("one of --url or --file is required"),
            };
            let item = store.insert_with(|id| Item::new(id, source, should_pass))?;
            println!("Added item {}", item.id);
        }
        ItemCommands::Remove { id } => {
            if !store.delete(id)? {
                bail!("no item with id {id}");
            }
            println!("Removed item {id}");
        }
        ItemCommands::Check { id, response, policy } => {
            let Some(item) = store.get(id)? else {
                bail!("no item with id {id}");
            };
            let checker = build_checker(config, &policy)?;
            let body = read_response(&response).await?;
            let report = checker
                .check(&item.reference(), &body)
                .with_context(|| format!("malformed response {}", response.display()))?;
            store.update(id, |stored| stored.record_report(report.clone()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(exit_status(&report));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_status(report: &AvatarReport) -> ExitCode {
    if report.has_valid_avatar {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_FACE: &str = r#"{"faceCount": 1, "faces": [{
        "box": {"x": 0, "y": 0, "width": 120, "height": 120},
        "pose": {"pitch": 0, "yaw": 0, "roll": 0},
        "mask": {"type": 0, "probability": 99}
    }]}"#;

    fn config(store_path: PathBuf) -> Config {
        Config {
            profile: "strict".to_string(),
            policy_file: None,
            provider: ProviderKind::Generic,
            eye_encoding: EyeOpenEncoding::ZeroIsOpen,
            store_path,
            fail_fast: None,
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_add_requires_a_source() {
        assert!(Cli::try_parse_from(["avatar", "items", "add"]).is_err());
        assert!(Cli::try_parse_from(["avatar", "items", "add", "--url", "u", "--file", "f"]).is_err());
        assert!(Cli::try_parse_from(["avatar", "items", "add", "--file", "f", "--should-pass", "true"]).is_ok());
    }

    #[test]
    fn test_profile_and_policy_conflict() {
        let res = Cli::try_parse_from(["avatar", "evaluate", "-r", "x.json", "--profile", "strict", "--policy", "p.toml"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_stdin_response_needs_an_image() {
        assert!(image_reference(Path::new("-"), None).is_err());
        assert_eq!(image_reference(Path::new("-"), Some("me.jpg".into())).unwrap(), "me.jpg");
        assert_eq!(image_reference(Path::new("resp/a.json"), None).unwrap(), "resp/a.json");
    }

    #[test]
    fn test_flags_override_environment() {
        let mut config = config(PathBuf::from("unused"));
        config.fail_fast = Some(false);

        let checker = build_checker(&config, &PolicyArgs::default()).unwrap();
        assert!(!checker.policy().fail_fast);
        assert!(!checker.policy().allows_mask(avatar_core::MaskType::WornCorrectly));

        let args = PolicyArgs { profile: Some("permissive".into()), fail_fast: true, ..Default::default() };
        let checker = build_checker(&config, &args).unwrap();
        assert!(checker.policy().fail_fast);
        assert!(checker.policy().allows_mask(avatar_core::MaskType::WornCorrectly));

        let args = PolicyArgs { profile: Some("lenient".into()), ..Default::default() };
        assert!(build_checker(&config, &args).is_err());
    }

    #[tokio::test]
    async fn test_batch_reports_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let empty = dir.path().join("empty.json");
        std::fs::write(&good, CLEAN_FACE).unwrap();
        std::fs::write(&empty, r#"{"faceCount": 0, "faces": []}"#).unwrap();

        let checker = build_checker(&config(dir.path().join("items.jsonl")), &PolicyArgs::default()).unwrap();
        assert_eq!(run_batch(checker, vec![good.clone()]).await.unwrap(), ExitCode::SUCCESS);

        let checker = build_checker(&config(dir.path().join("items.jsonl")), &PolicyArgs::default()).unwrap();
        assert_eq!(run_batch(checker, vec![good, empty]).await.unwrap(), ExitCode::from(EXIT_REJECTED));
    }

    #[tokio::test]
    async fn test_batch_fails_on_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let checker = build_checker(&config(dir.path().join("items.jsonl")), &PolicyArgs::default()).unwrap();
        assert!(run_batch(checker, vec![dir.path().join("missing.json")]).await.is_err());
    }

    #[tokio::test]
    async fn test_item_check_records_report() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("items.jsonl");
        let config = config(store_path.clone());
        let response = dir.path().join("face.json");
        std::fs::write(&response, CLEAN_FACE).unwrap();

        let add = ItemCommands::Add { url: None, file: Some("me.jpg".into()), should_pass: Some(true) };
        run_items(&config, add).await.unwrap();
        let check = ItemCommands::Check { id: 1, response, policy: PolicyArgs::default() };
        assert_eq!(run_items(&config, check).await.unwrap(), ExitCode::SUCCESS);

        let store: JsonLineStore<Item> = JsonLineStore::open(store_path).unwrap();
        let item = store.get(1).unwrap().unwrap();
        assert_eq!(item.passed, Some(true));
        assert_eq!(item.agrees(), Some(true));
        assert_eq!(item.report.unwrap().image_path, "me.jpg");

        assert!(run_items(&config, ItemCommands::Remove { id: 9 }).await.is_err());
    }
}
