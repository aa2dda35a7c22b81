use std::fs::File;
use std::io::{self, Write};

/// Writes every record to both sinks, so a logger with a stream handler and
/// a file handler attached (as `config_logger` does) behaves like two
/// independent handlers rather than a single destination.
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.a.write_all(buf)?;
        self.b.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

/// Mirrors `log_utils.py`'s `config_logger`: one root logger, a fixed
/// `timestamp [LEVEL] message` format, an optional stdout stream, and an
/// optional file sink, attached as two independent handlers when both are
/// requested so every record lands on both destinations.
pub fn init(level: &str, stream: bool, file_path: Option<&std::path::Path>) {
    let filter = match level {
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "critical" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(filter);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    let file = file_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match File::options().create(true).append(true).open(path) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("repowarden: could not open log file {path:?}: {e}");
                None
            }
        }
    });

    match (stream, file) {
        (true, Some(f)) => {
            builder.target(env_logger::Target::Pipe(Box::new(Tee { a: io::stderr(), b: f })));
        }
        (true, None) => {}
        (false, Some(f)) => {
            builder.target(env_logger::Target::Pipe(Box::new(f)));
        }
        (false, None) => {
            builder.target(env_logger::Target::Pipe(Box::new(io::sink())));
        }
    }

    let _ = builder.try_init();
}
