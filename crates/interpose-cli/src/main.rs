//! `interpose`: generate interception proxies for Go types.
//!
//! Meant to be driven by `go generate` from inside the package that declares
//! the target type:
//!
//! ```text
//! //go:generate interpose --type MyService --passthrough-methods Flush
//! ```
//!
//! Every non-test `.go` file in the directory is read, the wrapper is
//! generated and written next to them as `<Type>_proxy_gen.go`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use interpose_generator::{Error, GeneratedProxy, Generator};
use interpose_types::{GenerationConfig, SourceFile, WrapperStyle, parse_method_list};

/// CLI arguments for interpose
#[derive(Parser, Debug)]
#[command(name = "interpose")]
#[command(about = "Generate a proxy that routes every method of a Go type through one handler")]
struct Args {
    /// Name of the type to wrap
    #[arg(short, long = "type")]
    type_name: String,

    /// Comma-separated methods forwarded directly, without the handler
    #[arg(long, alias = "exclude-methods", default_value = "")]
    passthrough_methods: String,

    /// Package of the target type (defaults to $GOPACKAGE when set)
    #[arg(short, long)]
    package: Option<String>,

    /// Directory containing the package's Go files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Naming style of the generated wrapper
    #[arg(long, value_enum, default_value_t = Style::Proxy)]
    style: Style,

    /// Output path (defaults to <Type>_<style>_gen.go inside --dir)
    #[arg(short, long, conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Print the generated source instead of writing a file
    #[arg(long)]
    stdout: bool,

    /// Print the analysed model as JSON instead of generating source
    #[arg(long)]
    emit_model: bool,

    /// Pipe the generated source through gofmt
    #[arg(long)]
    gofmt: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    Proxy,
    Decorator,
}

impl From<Style> for WrapperStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Proxy => WrapperStyle::Proxy,
            Style::Decorator => WrapperStyle::Decorator,
        }
    }
}

/// Build the generation request. `gopackage` is the value of `$GOPACKAGE`.
fn build_config(args: &Args, gopackage: Option<String>) -> GenerationConfig {
    let mut config = GenerationConfig::new(args.type_name.trim())
        .with_passthrough(parse_method_list(&args.passthrough_methods))
        .with_style(args.style.into());

    config.package = args
        .package
        .clone()
        .or(gopackage)
        .filter(|p| !p.is_empty());
    config
}

/// Read every `.go` file in `dir` except tests, which `go build` ignores.
fn read_sources(dir: &Path) -> Result<Vec<SourceFile>> {
    let base = dir
        .to_str()
        .with_context(|| format!("Directory path is not valid UTF-8: {}", dir.display()))?;
    let pattern = format!("{}/*.go", glob::Pattern::escape(base));

    let mut files = Vec::new();
    for entry in glob::glob(&pattern).context("Invalid source pattern")? {
        let path = entry.context("Failed to read directory entry")?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with("_test.go") {
            log::debug!("skipping test file {}", name);
            continue;
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(SourceFile::new(name, contents));
    }

    if files.is_empty() {
        anyhow::bail!("No Go source files found in {}", dir.display());
    }
    log::debug!("read {} files from {}", files.len(), dir.display());
    Ok(files)
}

/// Format `source` with an external gofmt.
fn run_gofmt(source: &str) -> Result<String> {
    let mut child = Command::new("gofmt")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to start gofmt")?;

    child
        .stdin
        .take()
        .context("gofmt stdin is not available")?
        .write_all(source.as_bytes())
        .context("Failed to send source to gofmt")?;

    let output = child.wait_with_output().context("Failed to wait for gofmt")?;
    if !output.status.success() {
        return Err(Error::Format {
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            text: source.to_string(),
        }
        .into());
    }

    String::from_utf8(output.stdout).context("gofmt produced invalid UTF-8")
}

/// Run one invocation. Text meant for standard output goes to `out`; the
/// written path is returned when a file was produced.
fn run(args: &Args, gopackage: Option<String>, out: &mut dyn Write) -> Result<Option<PathBuf>> {
    let generator = Generator::new(build_config(args, gopackage))?;
    let files = read_sources(&args.dir)?;

    if args.emit_model {
        let model = generator.analyze(&files)?;
        let json = serde_json::to_string_pretty(&model).context("Failed to serialize model")?;
        writeln!(out, "{}", json)?;
        return Ok(None);
    }

    let mut generated: GeneratedProxy = generator.generate(&files)?;
    if args.gofmt {
        generated.source = run_gofmt(&generated.source)?;
    }

    if args.stdout {
        out.write_all(generated.source.as_bytes())?;
        return Ok(None);
    }

    let path = match &args.output {
        Some(path) => {
            generated.write_file(path)?;
            path.clone()
        }
        None => generated.write_to(&args.dir)?,
    };
    Ok(Some(path))
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let gopackage = std::env::var("GOPACKAGE").ok();
    let mut stdout = std::io::stdout().lock();

    match run(&args, gopackage, &mut stdout) {
        Ok(Some(path)) => log::info!("generated {}", path.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("[interpose] Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
