use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;

use legacy_core::{generate, recover_payload, Config, IntegrationEngine, Share, SoftwareCard};

#[derive(Parser)]
#[command(name = "legacy", about = "Split a bequeathed secret across RSA-keyed successors, or reconstruct it from their shares")]
struct Cli {
    /// Protocol parameters: successor list, quorum, seed size, KDF steps.
    #[arg(long, global = true, default_value = "./legacy.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Draw a fresh seed, encrypt the payload under it, and write one share per successor.
    Generate {
        /// File containing the payload to bequeath.
        #[arg(long)]
        payload: PathBuf,
        /// Directory to write data.bin and shares/<i>.json into.
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Present smartcard stand-ins one at a time and reconstruct the payload once quorum is reached.
    Integrate {
        /// Directory containing the share JSON files written by `generate`.
        #[arg(long)]
        shares_dir: PathBuf,
        /// File to write the recovered payload to.
        #[arg(long)]
        out: PathBuf,
        /// A software card stand-in: `path/to/private_key.pem:pin`. Repeatable.
        #[arg(long = "key", required = true)]
        keys: Vec<String>,
    },
    /// Validate protocol parameters and print the leaf-count / partial-knowledge report.
    Analyze,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    match cli.command {
        Command::Generate { payload, out_dir } => run_generate(&config, &payload, &out_dir),
        Command::Integrate { shares_dir, out, keys } => run_integrate(&config, &shares_dir, &out, &keys),
        Command::Analyze => run_analyze(&config),
    }
}

fn run_analyze(config: &Config) -> Result<()> {
    let report = legacy_core::analyze(config.successor_count(), config.required_to_decrypt, config.seed_size)?;
    println!("leaf_count:      {}", report.leaf_count);
    println!("bytes_per_leaf:  {}", report.bytes_per_leaf);
    for k in &report.knowledge {
        println!(
            "  {} successor(s) present -> {}% known, {} bytes missing",
            k.coalition_size, k.percent_known, k.missing_bytes
        );
    }
    Ok(())
}

fn run_generate(config: &Config, payload_path: &Path, out_dir: &Path) -> Result<()> {
    legacy_core::analyze(config.successor_count(), config.required_to_decrypt, config.seed_size)?;

    let payload = fs::read(payload_path)
        .with_context(|| format!("reading payload from {}", payload_path.display()))?;
    let mut rng = OsRng;
    let output = generate(config, &payload, &mut rng)?;

    fs::create_dir_all(out_dir)?;
    let shares_dir = out_dir.join("shares");
    fs::create_dir_all(&shares_dir)?;

    let data_json = serde_json::to_vec_pretty(&output.data)?;
    write_readonly(&out_dir.join("data.bin"), &data_json)?;

    for (i, share) in output.shares.iter().enumerate() {
        let share_json = serde_json::to_vec_pretty(share)?;
        write_readonly(&shares_dir.join(format!("{i}.json")), &share_json)?;
    }

    println!(
        "wrote {} share(s) and one payload envelope to {}",
        output.shares.len(),
        out_dir.display()
    );
    Ok(())
}

fn run_integrate(config: &Config, shares_dir: &Path, out: &Path, keys: &[String]) -> Result<()> {
    let shares = load_shares(shares_dir)?;
    let data: legacy_core::Data = {
        let raw = fs::read(shares_dir_data_path(shares_dir))
            .with_context(|| "reading payload envelope".to_string())?;
        serde_json::from_slice(&raw)?
    };

    let mut engine = IntegrationEngine::new(config);
    for key_arg in keys {
        let (path, pin) = parse_key_arg(key_arg)?;
        let card = load_software_card(&path, &pin)?;
        match engine.present_card(&card, &pin, &shares) {
            Ok(progress) => println!(
                "{}: applied, {progress} of {} seed bytes known",
                card_label(&path),
                config.seed_size
            ),
            Err(legacy_core::LegacyError::DuplicateCard) => {
                println!("{}: already applied, skipping", card_label(&path));
            }
            Err(legacy_core::LegacyError::UnrecognizedCard) => {
                println!("{}: does not match any known successor, skipping", card_label(&path));
            }
            Err(e) => println!("{}: {e}, skipping", card_label(&path)),
        }
        if engine.is_complete() {
            break;
        }
    }

    if !engine.is_complete() {
        bail!(
            "insufficient quorum: {} of {} seed bytes known",
            engine.progress(),
            config.seed_size
        );
    }

    let payload = recover_payload(&engine, config.kdf_steps, &data)?;
    write_readonly(out, &payload)?;
    println!("recovered payload written to {}", out.display());
    Ok(())
}

/// `generate` writes `data.bin` as a sibling of the `shares/` directory it fills;
/// `integrate` locates it the same way rather than taking a redundant flag.
fn shares_dir_data_path(shares_dir: &Path) -> PathBuf {
    shares_dir
        .parent()
        .map(|p| p.join("data.bin"))
        .unwrap_or_else(|| PathBuf::from("data.bin"))
}

fn load_shares(shares_dir: &Path) -> Result<Vec<Share>> {
    let mut shares = Vec::new();
    for entry in fs::read_dir(shares_dir).with_context(|| format!("reading {}", shares_dir.display()))? {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = fs::read(entry.path())?;
        shares.push(serde_json::from_slice(&raw).with_context(|| format!("parsing {}", entry.path().display()))?);
    }
    if shares.is_empty() {
        bail!("no share files found in {}", shares_dir.display());
    }
    Ok(shares)
}

fn parse_key_arg(arg: &str) -> Result<(PathBuf, String)> {
    let (path, pin) = arg
        .rsplit_once(':')
        .with_context(|| format!("--key argument `{arg}` must be in the form path:pin"))?;
    Ok((PathBuf::from(path), pin.to_string()))
}

fn load_software_card(path: &Path, pin: &str) -> Result<SoftwareCard> {
    let bytes = fs::read(path).with_context(|| format!("reading private key from {}", path.display()))?;
    let pem_key = std::str::from_utf8(&bytes).ok().and_then(|s| RsaPrivateKey::from_pkcs1_pem(s).ok());
    let private_key = match pem_key {
        Some(key) => key,
        None => RsaPrivateKey::from_pkcs1_der(&bytes)
            .with_context(|| format!("invalid PKCS#1 private key at {}", path.display()))?,
    };
    Ok(SoftwareCard::new(card_label(path), private_key, pin))
}

fn card_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("card")
        .to_string()
}

fn write_readonly(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    let mut perms = fs::metadata(&tmp)?.permissions();
    perms.set_mode(0o444);
    fs::set_permissions(&tmp, perms)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
