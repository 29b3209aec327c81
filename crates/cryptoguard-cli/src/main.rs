//! cryptoguard: password-based encryption CLI
//!
//! Commands:
//!   encrypt <text>                   - encrypt text, print base64 envelope
//!   decrypt <base64>                 - decrypt a base64 envelope
//!   encrypt-file <in> [<out>]        - encrypt one file (default out: <in>.enc)
//!   decrypt-file <in> [<out>]        - decrypt one file (default out: strip .enc)
//!   encrypt-folder <in> <out>        - encrypt a directory tree, per file or bundled
//!   decrypt-folder <in> <out>        - decrypt every *.enc file under a directory
//!   decrypt-zip <in.zip.enc> <out>   - decrypt and extract a bundled folder
//!   steg-embed / steg-extract        - hide an encrypted file in an image and back
//!   config show                      - display current configuration

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use cryptoguard_core::config::{FolderConfig, GuardConfig};
use cryptoguard_core::{FolderOptions, FolderReport, ProgressFn};
use cryptoguard_crypto::{KdfParams, StreamParams};
use cryptoguard_folder::pipeline::{strip_suffix, with_suffix};
use cryptoguard_steg::Framing;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cryptoguard",
    version,
    about = "Password-based encryption for text, files, folders and images",
    long_about = "cryptoguard: AES-256-GCM encryption under a PBKDF2-derived key, \
                  with folder bundling and LSB image steganography"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "CRYPTOGUARD_CONFIG",
        default_value = "~/.config/cryptoguard/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "CRYPTOGUARD_LOG")]
    log: Option<String>,

    /// Log format; overrides [log] format
    #[arg(long, env = "CRYPTOGUARD_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Args, Debug)]
struct PasswordArg {
    /// Password (prompted for when neither this nor CRYPTOGUARD_PASSWORD is set)
    #[arg(long, short = 'p', env = "CRYPTOGUARD_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt text and print the base64 envelope
    Encrypt {
        text: String,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Decrypt a base64 envelope and print the text
    Decrypt {
        ciphertext: String,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Encrypt a single file
    #[command(name = "encrypt-file")]
    EncryptFile {
        input: PathBuf,
        /// Destination (default: <input>.enc)
        output: Option<PathBuf>,
        /// Remove the input after a successful encrypt
        #[arg(long)]
        delete_original: bool,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Decrypt a single file
    #[command(name = "decrypt-file")]
    DecryptFile {
        input: PathBuf,
        /// Destination (default: input without its .enc suffix)
        output: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Encrypt every file in a directory
    ///
    /// Flags can only enable options; [folder] in the config supplies defaults.
    #[command(name = "encrypt-folder")]
    EncryptFolder {
        input: PathBuf,
        output: PathBuf,
        /// Descend into subdirectories
        #[arg(long, short = 'r')]
        recursive: bool,
        /// Remove sources after they were encrypted
        #[arg(long)]
        delete_original: bool,
        /// Archive the whole tree and encrypt it as one <dirname>.zip.enc
        #[arg(long)]
        bundle_first: bool,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Decrypt every *.enc file in a directory
    #[command(name = "decrypt-folder")]
    DecryptFolder {
        input: PathBuf,
        output: PathBuf,
        /// Descend into subdirectories
        #[arg(long, short = 'r')]
        recursive: bool,
        /// Remove the encrypted sources once all of them decrypted
        #[arg(long)]
        delete_original: bool,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Decrypt a bundled folder (<name>.zip.enc) and extract it
    #[command(name = "decrypt-zip")]
    DecryptZip {
        input: PathBuf,
        output: PathBuf,
        /// Remove the encrypted bundle after extraction
        #[arg(long)]
        delete_original: bool,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Encrypt a file and hide it in an image (written as PNG)
    #[command(name = "steg-embed")]
    StegEmbed {
        /// Secret file to hide
        #[arg(long = "in")]
        input: PathBuf,
        /// Carrier image (PNG, BMP or TIFF)
        #[arg(long)]
        img: PathBuf,
        /// Output image
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Recover and decrypt a file hidden with steg-embed
    #[command(name = "steg-extract")]
    StegExtract {
        /// Image carrying the payload
        #[arg(long)]
        img: PathBuf,
        /// Where to write the secret (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArg,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = GuardConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = match cli.log_format {
        Some(format) => format,
        None => LogFormat::from_str(&config.log.format, true)
            .map_err(|e| anyhow!("invalid [log] format {:?}: {e}", config.log.format))?,
    };
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "cryptoguard starting"
    );

    let kdf = KdfParams {
        iterations: config.crypto.pbkdf2_iterations,
    };
    let stream = StreamParams {
        kdf,
        chunk_size: config.crypto.chunk_size,
    };

    match cli.command {
        Commands::Encrypt { text, password } => cmd_encrypt(&text, password.resolve(true)?, &kdf),
        Commands::Decrypt {
            ciphertext,
            password,
        } => cmd_decrypt(&ciphertext, password.resolve(false)?, &kdf),
        Commands::EncryptFile {
            input,
            output,
            delete_original,
            password,
        } => cmd_encrypt_file(
            &input,
            output,
            delete_original,
            password.resolve(true)?,
            &stream,
        ),
        Commands::DecryptFile {
            input,
            output,
            password,
        } => cmd_decrypt_file(&input, output, password.resolve(false)?, &kdf),
        Commands::EncryptFolder {
            input,
            output,
            recursive,
            delete_original,
            bundle_first,
            password,
        } => {
            let opts = folder_options(&config.folder, recursive, delete_original, bundle_first);
            cmd_encrypt_folder(&input, &output, &opts, password.resolve(true)?, &stream)
        }
        Commands::DecryptFolder {
            input,
            output,
            recursive,
            delete_original,
            password,
        } => {
            let opts = folder_options(&config.folder, recursive, delete_original, false);
            cmd_decrypt_folder(&input, &output, &opts, password.resolve(false)?, &kdf)
        }
        Commands::DecryptZip {
            input,
            output,
            delete_original,
            password,
        } => cmd_decrypt_zip(
            &input,
            &output,
            delete_original || config.folder.delete_original,
            password.resolve(false)?,
            &kdf,
        ),
        Commands::StegEmbed {
            input,
            img,
            out,
            password,
        } => cmd_steg_embed(
            &input,
            &img,
            &out,
            password.resolve(true)?,
            &kdf,
            &Framing::from(&config.steg),
        ),
        Commands::StegExtract { img, out, password } => cmd_steg_extract(
            &img,
            out.as_deref(),
            password.resolve(false)?,
            &kdf,
            &Framing::from(&config.steg),
        ),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is reserved for command output
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Option resolution ─────────────────────────────────────────────────────────

impl PasswordArg {
    /// Flag or env value, else an interactive prompt (asked twice when
    /// `confirm` is set).
    fn resolve(self, confirm: bool) -> Result<SecretString> {
        let password = match self.password {
            Some(p) => p,
            None => {
                let p = rpassword::prompt_password("Password: ").context("reading password")?;
                if confirm {
                    let again = rpassword::prompt_password("Confirm password: ")
                        .context("reading password")?;
                    if again != p {
                        anyhow::bail!("passwords do not match");
                    }
                }
                p
            }
        };
        if password.is_empty() {
            anyhow::bail!("password must not be empty");
        }
        Ok(SecretString::from(password))
    }
}

/// Config supplies defaults; flags can only turn options on.
fn folder_options(
    cfg: &FolderConfig,
    recursive: bool,
    delete_original: bool,
    bundle_first: bool,
) -> FolderOptions {
    let base = FolderOptions::from(cfg);
    FolderOptions {
        recursive: base.recursive || recursive,
        delete_original: base.delete_original || delete_original,
        bundle_first: base.bundle_first || bundle_first,
    }
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(bar_style());
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn progress_callback(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

// ── `cryptoguard encrypt` / `decrypt` ─────────────────────────────────────────

fn cmd_encrypt(text: &str, password: SecretString, kdf: &KdfParams) -> Result<()> {
    let envelope =
        cryptoguard_crypto::encrypt_text(text, &password, kdf).context("encrypting text")?;
    println!("{envelope}");
    Ok(())
}

fn cmd_decrypt(ciphertext: &str, password: SecretString, kdf: &KdfParams) -> Result<()> {
    let text =
        cryptoguard_crypto::decrypt_text(ciphertext, &password, kdf).context("decrypting text")?;
    println!("{text}");
    Ok(())
}

// ── `cryptoguard encrypt-file` / `decrypt-file` ───────────────────────────────

fn cmd_encrypt_file(
    input: &Path,
    output: Option<PathBuf>,
    delete_original: bool,
    password: SecretString,
    stream: &StreamParams,
) -> Result<()> {
    let output = output.unwrap_or_else(|| with_suffix(input));
    if output == input {
        anyhow::bail!("output must differ from input: {}", input.display());
    }

    let pb = make_spinner("encrypt");
    pb.set_message(input.display().to_string());
    let bytes = cryptoguard_crypto::encrypt_file(input, &output, &password, stream)
        .inspect_err(|_| pb.abandon())
        .with_context(|| format!("encrypting {}", input.display()))?;
    pb.finish_and_clear();

    println!(
        "Encrypted {} → {} ({})",
        input.display(),
        output.display(),
        fmt_bytes(bytes)
    );
    if delete_original && cryptoguard_folder::cleanup::remove_file(input) {
        println!("  removed {}", input.display());
    }
    Ok(())
}

fn cmd_decrypt_file(
    input: &Path,
    output: Option<PathBuf>,
    password: SecretString,
    kdf: &KdfParams,
) -> Result<()> {
    let output = match output {
        Some(path) => path,
        None => strip_suffix(input).with_context(|| {
            format!(
                "{} has no {} suffix; pass an output path",
                input.display(),
                cryptoguard_core::ENCRYPTED_SUFFIX
            )
        })?,
    };

    let pb = make_spinner("decrypt");
    pb.set_message(input.display().to_string());
    let bytes = cryptoguard_crypto::decrypt_file(input, &output, &password, kdf)
        .inspect_err(|_| pb.abandon())
        .with_context(|| format!("decrypting {}", input.display()))?;
    pb.finish_and_clear();

    println!(
        "Decrypted {} → {} ({})",
        input.display(),
        output.display(),
        fmt_bytes(bytes)
    );
    Ok(())
}

// ── `cryptoguard encrypt-folder` / `decrypt-folder` / `decrypt-zip` ───────────

fn cmd_encrypt_folder(
    input: &Path,
    output: &Path,
    opts: &FolderOptions,
    password: SecretString,
    stream: &StreamParams,
) -> Result<()> {
    let pb = make_progress_bar(0, "encrypt");
    let progress = progress_callback(&pb);

    let report = cryptoguard_folder::encrypt_folder(
        input,
        output,
        &password,
        opts,
        stream,
        Some(&progress),
    )
    .inspect_err(|_| pb.abandon())
    .with_context(|| format!("encrypting folder {}", input.display()))?;

    pb.finish_with_message("done".to_string());
    print_report("Encrypt", &report);
    Ok(())
}

fn cmd_decrypt_folder(
    input: &Path,
    output: &Path,
    opts: &FolderOptions,
    password: SecretString,
    kdf: &KdfParams,
) -> Result<()> {
    let pb = make_progress_bar(0, "decrypt");
    let progress = progress_callback(&pb);

    let report =
        cryptoguard_folder::decrypt_folder(input, output, &password, opts, kdf, Some(&progress))
            .inspect_err(|_| pb.abandon())
            .with_context(|| format!("decrypting folder {}", input.display()))?;

    pb.finish_with_message("done".to_string());
    print_report("Decrypt", &report);
    Ok(())
}

fn cmd_decrypt_zip(
    input: &Path,
    output: &Path,
    delete_original: bool,
    password: SecretString,
    kdf: &KdfParams,
) -> Result<()> {
    let pb = make_spinner("decrypt");
    pb.set_message(input.display().to_string());

    let report =
        cryptoguard_folder::decrypt_bundle(input, output, &password, delete_original, kdf)
            .inspect_err(|_| pb.abandon())
            .with_context(|| format!("decrypting bundle {}", input.display()))?;

    pb.finish_and_clear();
    print_report("Extract", &report);
    Ok(())
}

fn print_report(verb: &str, report: &FolderReport) {
    println!();
    println!("{verb} complete:");
    println!("  files: {}", report.files);
    println!("  bytes: {}", fmt_bytes(report.bytes));
    if !report.cleanup_failures.is_empty() {
        println!("  not removed ({}):", report.cleanup_failures.len());
        for path in &report.cleanup_failures {
            println!("    {}", path.display());
        }
    }
}

// ── `cryptoguard steg-embed` / `steg-extract` ─────────────────────────────────

fn cmd_steg_embed(
    input: &Path,
    img: &Path,
    out: &Path,
    password: SecretString,
    kdf: &KdfParams,
    framing: &Framing,
) -> Result<()> {
    let secret = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let payload =
        cryptoguard_crypto::seal_base64(&secret, &password, kdf).context("encrypting payload")?;

    cryptoguard_steg::embed_file(img, payload.as_bytes(), out, framing)
        .with_context(|| format!("embedding into {}", img.display()))?;

    println!(
        "Embedded {} ({}) into {}",
        input.display(),
        fmt_bytes(secret.len() as u64),
        out.display()
    );
    Ok(())
}

fn cmd_steg_extract(
    img: &Path,
    out: Option<&Path>,
    password: SecretString,
    kdf: &KdfParams,
    framing: &Framing,
) -> Result<()> {
    let payload = cryptoguard_steg::extract_file(img, framing)
        .with_context(|| format!("extracting from {}", img.display()))?;
    let envelope =
        std::str::from_utf8(&payload).context("hidden payload is not an encrypted envelope")?;
    let secret = cryptoguard_crypto::open_base64(envelope, &password, kdf)
        .context("decrypting hidden payload")?;

    match out {
        Some(path) => {
            std::fs::write(path, &secret)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Extracted {} from {} → {}",
                fmt_bytes(secret.len() as u64),
                img.display(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&secret).context("writing to stdout")?;
            stdout.flush().context("writing to stdout")?;
        }
    }
    Ok(())
}

// ── `cryptoguard config show` ─────────────────────────────────────────────────

fn cmd_config_show(config: &GuardConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
