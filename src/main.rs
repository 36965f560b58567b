use std::fs;
use std::io::{self, Read, Write};
use std::path;
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use interval_set::interval_set::IntervalSet;
use interval_set::script::{Op, ScriptParser, DEMOS};

#[derive(Parser, Debug)]
#[command(about = "Apply add/remove range operations to an interval set and print it after each step")]
struct Cli {
    /// Operation script to run, `-` or absent for stdin.
    #[arg(name = "script", index(1), conflicts_with = "demo")]
    script: Option<path::PathBuf>,
    /// Run a built-in demo script instead, or `all` of them.
    #[arg(name = "demo", long, short)]
    demo: Option<String>,
    /// Only print the set before each cleanup and at the end.
    #[arg(long, short)]
    quiet: bool,
}

struct Case {
    name: String,
    ops: Vec<Op>,
}

fn load_cases(cli: &Cli, parser: &ScriptParser) -> Result<Vec<Case>> {
    if let Some(demo) = &cli.demo {
        let selected: Vec<_> = DEMOS.iter()
            .filter(|(name, _)| demo.as_str() == "all" || demo.as_str() == *name)
            .collect();
        if selected.is_empty() {
            let names: Vec<_> = DEMOS.iter().map(|(name, _)| *name).collect();
            bail!("unknown demo `{}`, expected `all` or one of: {}", demo, names.join(", "));
        }
        return selected.into_iter()
            .map(|(name, script)| -> Result<Case> {
                let ops = parser.parse(script).with_context(|| format!("failed to parse demo `{}`", name))?;
                Ok(Case{name: name.to_string(), ops})
            })
            .collect();
    }

    let (name, text) = match &cli.script {
        Some(p) if p.as_os_str() != "-" => {
            let text = fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))?;
            (p.display().to_string(), text)
        },
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text).context("failed to read stdin")?;
            ("<stdin>".to_string(), text)
        }
    };
    let ops = parser.parse(&text).with_context(|| format!("failed to parse {}", name))?;
    Ok(vec![Case{name, ops}])
}

fn run_case<W: Write>(out: &mut W, case: &Case, quiet: bool) -> io::Result<()> {
    info!(case = %case.name, ops = case.ops.len(), "running");
    let mut set = IntervalSet::new();
    let mut dirty = false;
    for op in &case.ops {
        debug!(%op, "applying");
        if let Op::Clear = op {
            if quiet && dirty {
                writeln!(out, "{}", set)?;
            }
            op.apply(&mut set);
            writeln!(out, "----Cleaned up intervals----\n")?;
            dirty = false;
            continue;
        }

        op.apply(&mut set);
        dirty = true;
        if !quiet {
            writeln!(out, "{}", set)?;
        }
    }
    if quiet && dirty {
        writeln!(out, "{}", set)?;
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let parser = ScriptParser::new()?;
    let cases = load_cases(&cli, &parser)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for case in &cases {
        run_case(&mut out, case, cli.quiet).with_context(|| format!("failed to write output of {}", case.name))?;
    }
    Ok(())
}

#[cfg(test)]
fn test_output(script: &str, quiet: bool) -> String {
    let parser = ScriptParser::new().unwrap();
    let case = Case{name: "test".to_string(), ops: parser.parse(script).unwrap()};
    let mut out = Vec::new();
    run_case(&mut out, &case, quiet).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_run_case_prints_each_step() {
    assert_eq!(test_output("add 1 5\nrem 2 3\ncleanup\n", false),
               "[[1,5]]\n[[1,2][3,5]]\n----Cleaned up intervals----\n\n");
}

#[test]
fn test_run_case_quiet() {
    assert_eq!(test_output("add 1 5\nrem 2 3\ncleanup\nadd 7 9\n", true),
               "[[1,2][3,5]]\n----Cleaned up intervals----\n\n[[7,9]]\n");
}

#[test]
fn test_cli_demo_selection() {
    let parser = ScriptParser::new().unwrap();

    let cli = Cli::parse_from(["interval-set", "--demo", "all"]);
    let cases = load_cases(&cli, &parser).unwrap();
    assert_eq!(cases.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
               vec!["case1", "case2", "case3", "email", "ym"]);

    let cli = Cli::parse_from(["interval-set", "-d", "email"]);
    assert_eq!(load_cases(&cli, &parser).unwrap().len(), 1);

    let cli = Cli::parse_from(["interval-set", "--demo", "nope"]);
    assert!(load_cases(&cli, &parser).is_err());

    assert!(Cli::try_parse_from(["interval-set", "script.txt", "--demo", "all"]).is_err());
}

#[test]
fn test_cli_script_file() {
    let parser = ScriptParser::new().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# split then bridge").unwrap();
    writeln!(file, "add 1 5\nrem(2, 3);\nadd 2 7").unwrap();
    file.flush().unwrap();

    let path = file.path().to_str().unwrap();
    let cli = Cli::parse_from(["interval-set", path]);
    let cases = load_cases(&cli, &parser).unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].name, file.path().display().to_string());

    let mut out = Vec::new();
    run_case(&mut out, &cases[0], false).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "[[1,5]]\n[[1,2][3,5]]\n[[1,7]]\n");
}

#[test]
fn test_cli_script_errors() {
    use std::ffi::OsStr;

    let parser = ScriptParser::new().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.txt");
    let cli = Cli::parse_from([OsStr::new("interval-set"), missing.as_os_str()]);
    let err = load_cases(&cli, &parser).err().unwrap();
    assert_eq!(err.to_string(), format!("failed to read {}", missing.display()));

    let bad = dir.path().join("bad.txt");
    fs::write(&bad, "add 1 5\nfrobnicate\n").unwrap();
    let cli = Cli::parse_from([OsStr::new("interval-set"), bad.as_os_str()]);
    let err = load_cases(&cli, &parser).err().unwrap();
    assert_eq!(err.to_string(), format!("failed to parse {}", bad.display()));
    assert!(format!("{:#}", err).contains("line 2: unrecognized operation `frobnicate`"));
}

#[test]
fn test_cli_stdin_selection() {
    let cli = Cli::parse_from(["interval-set", "-"]);
    assert_eq!(cli.script.as_deref().map(|p| p.as_os_str() == "-"), Some(true));
    assert!(cli.demo.is_none());

    let cli = Cli::parse_from(["interval-set"]);
    assert!(cli.script.is_none());
}
