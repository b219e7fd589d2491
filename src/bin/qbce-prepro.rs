use miette::{IntoDiagnostic, Result};
use qbce_prepro::{
    cli::{Options, USAGE},
    mem::TrackingAllocator,
    pcnf::Pcnf,
    qbce::{Qbce, QbceStats},
    qdimacs::{ExtendedParseError, QdimacsParser},
    signals,
};
use std::{io::Cursor, time::Instant};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator::new();

fn main() -> Result<()> {
    let start_time = Instant::now();

    let options = Options::from_args()?;
    init_tracing(options.verbosity);

    if options.print_usage {
        print!("{USAGE}");
        return Ok(());
    }

    signals::install().into_diagnostic()?;
    if let Some(seconds) = options.max_time {
        info!(seconds, "setting run time limit");
        signals::arm_timeout(seconds);
    }

    let contents = options.read_input()?;
    let reader = Cursor::new(&contents);
    let mut pcnf: Pcnf = match QdimacsParser::new(reader).parse() {
        Ok(pcnf) => pcnf,
        Err(err) => Err(ExtendedParseError { source_code: contents, related: vec![err] })?,
    };

    let qbce_stats = options.simplify.then(|| Qbce::new(&pcnf).run(&mut pcnf));

    if options.print_formula {
        print!("{pcnf}");
    }

    report(&options, &pcnf, qbce_stats.as_ref(), start_time);
    Ok(())
}

fn init_tracing(verbosity: u32) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();
}

fn report(options: &Options, pcnf: &Pcnf, qbce: Option<&QbceStats>, start_time: Instant) {
    match options.max_time {
        Some(seconds) => info!(seconds, "time limit"),
        None => info!("time limit: not set"),
    }
    info!(simplify = options.simplify, print_formula = options.print_formula, "configuration");
    if let Some(stats) = qbce {
        let total = pcnf.num_clauses();
        #[allow(clippy::cast_precision_loss)]
        let percent = if total == 0 {
            0.0
        } else {
            f64::from(stats.blocked_clauses) / total as f64 * 100.0
        };
        info!(
            passes = stats.passes,
            qbce_time = ?stats.run_time,
            "qbce: {} blocked clauses of total {} clauses ({percent:.2} % of the input)",
            stats.blocked_clauses,
            total,
        );
    }
    info!(peak_memory_bytes = ALLOCATOR.peak(), "memory high-water mark");
    info!(run_time = ?start_time.elapsed(), "done");
}
