use clap::Parser;
use iprange::{CidrSet, Range};
use log::{debug, warn, LevelFilter};
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;
use std::io::{self, BufRead, Write};

/// Convert IP ranges into the fewest CIDR blocks covering them.
///
/// Accepts `a.b.c.d/nn`, `a.b.c.d netmask`, `a.b.*.*`, `first-last` and single addresses.
#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Ranges to convert; lines are read from stdin when none are given
    ranges: Vec<String>,

    /// Merge the blocks of every range into one aggregated list
    #[arg(short, long, conflicts_with_all = ["count", "span"])]
    aggregate: bool,

    /// Print the number of addresses in each range
    #[arg(short, long)]
    count: bool,

    /// Print the smallest single block holding each range
    #[arg(short, long)]
    span: bool,

    /// Log more, repeat for debug and trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) -> Result<(), Box<dyn Error>> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l} {t} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn process<W: Write>(
    opts: &Opts,
    line: &str,
    list: &mut CidrSet,
    out: &mut W,
) -> io::Result<()> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(());
    }
    let range = match Range::parse(line) {
        Ok(range) => range,
        Err(e) => {
            warn!("skipping {:?}: {}", line, e);
            return Ok(());
        }
    };
    if opts.count {
        writeln!(out, "{}\t{}", range, range.count())?;
    }
    if opts.span {
        writeln!(out, "{}\t{}", range, range.span_network())?;
    }
    if opts.count || opts.span {
        return Ok(());
    }
    match range.networks() {
        Ok(networks) if opts.aggregate => list.extend(networks),
        Ok(networks) => {
            for network in networks {
                writeln!(out, "{}", network)?;
            }
        }
        Err(e) => warn!("skipping {}: {}", range, e),
    }
    Ok(())
}

/// Processes every line of `reader`; lines that are not valid UTF-8 are skipped.
fn process_lines<R: BufRead, W: Write>(
    opts: &Opts,
    reader: R,
    list: &mut CidrSet,
    out: &mut W,
) -> io::Result<()> {
    for (n, line) in reader.lines().enumerate() {
        match line {
            Ok(line) => process(opts, &line, list, out)?,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("skipping line {}: {}", n + 1, e)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let opts = Opts::parse();
    init_logging(opts.verbose)?;

    let mut list = CidrSet::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if opts.ranges.is_empty() {
        let stdin = io::stdin();
        process_lines(&opts, stdin.lock(), &mut list, &mut out)?;
    } else {
        for range in &opts.ranges {
            process(&opts, range, &mut list, &mut out)?;
        }
    }

    if opts.aggregate {
        debug!("aggregated into {} blocks", list.len());
        write!(out, "{}", list)?;
    }
    Ok(())
}
