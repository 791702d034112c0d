use std::error::Error as _;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process;

use astrofits::{Fits, Hdu, Header, Image, ReadMode};
use clap::Parser;

/// Print a summary of every HDU in a FITS file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// FITS file to inspect
    file: PathBuf,

    /// Only parse headers; data arrays are not decoded
    #[arg(long)]
    headers_only: bool,

    /// Print every header card
    #[arg(long)]
    cards: bool,

    /// Print min/max/mean/median/stddev of image arrays
    #[arg(long)]
    stats: bool,

    /// Log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn format_dimensions(header: &Header) -> String {
    let dims: Vec<String> = header.all_naxis().iter().map(|n| n.to_string()).collect();
    if dims.is_empty() {
        "none".to_string()
    } else {
        dims.join(" x ")
    }
}

fn format_image(out: &mut String, image: &Image, stats: bool) {
    if !stats {
        return;
    }
    match image.stats() {
        Some(s) => {
            let _ = writeln!(
                out,
                "  Stats: min {} max {} mean {:.6} median {} stddev {:.6}",
                s.min, s.max, s.mean, s.median, s.std_dev
            );
        }
        None => out.push_str("  Stats: no pixels\n"),
    }
}

fn format_hdu(out: &mut String, index: usize, header: &Header, hdu: Option<&Hdu>, args: &Args) {
    let kind = match hdu {
        Some(hdu) => hdu.kind().name().to_string(),
        None => header.hdu_name().unwrap_or_else(|_| "?".to_string()),
    };
    let label = match header.extname() {
        Some(name) => format!(" (EXTNAME: {})", name),
        None => String::new(),
    };
    let _ = writeln!(out, "HDU {}: {}{}", index, kind, label);
    let _ = writeln!(out, "  BITPIX: {}", header.bitpix());
    let _ = writeln!(out, "  Dimensions: {}", format_dimensions(header));
    if let Ok(len) = header.data_byte_len() {
        let _ = writeln!(out, "  Data size: {} bytes", len);
    }

    match hdu {
        Some(Hdu::Primary(p)) => format_image(out, p.get_data(), args.stats),
        #[cfg(feature = "image-extension")]
        Some(Hdu::Image(ext)) => format_image(out, ext.get_data(), args.stats),
        Some(Hdu::BinaryTable(t)) => {
            let _ = writeln!(out, "  Rows: {}  Columns: {}", t.row_count(), t.tfields());
            if !t.heap().is_empty() {
                let _ = writeln!(out, "  Heap size: {} bytes", t.heap().len());
            }
            for column in t.columns() {
                let _ = writeln!(out, "    {}", column);
            }
        }
        Some(Hdu::AsciiTable(t)) => {
            let _ = writeln!(out, "  Rows: {}  Columns: {}", t.row_count(), t.tfields());
            for column in t.columns() {
                let _ = writeln!(out, "    {}", column);
            }
        }
        Some(Hdu::Blank(_)) | None => {}
    }

    if args.cards {
        out.push_str("  Header cards:\n");
        for card in header.cards().iter().filter(|c| !c.is_end()) {
            let _ = writeln!(out, "    {}", card.as_str().trim_end());
        }
    }
}

fn format_fits(fits: &Fits, args: &Args) -> String {
    let mut out = String::new();
    for (i, header) in fits.headers().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        format_hdu(&mut out, i, header, fits.hdu(i).ok(), args);
    }
    out
}

fn run(args: &Args) -> astrofits::Result<String> {
    let mode = if args.headers_only {
        ReadMode::HeadersOnly
    } else {
        ReadMode::Full
    };
    let fits = Fits::open(&args.file, mode)?;
    log::info!("{}: {} HDUs", args.file.display(), fits.len());
    Ok(format_fits(&fits, args))
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    match run(&args) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use astrofits::{AsciiTable, BinaryTable, ColumnDef, ImageBuffer, PrimaryHdu};

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["fitsinfo", "in.fits"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn sample() -> Fits {
        let image: Image = ImageBuffer::new(2, 2, vec![1.0f32, 2.0, 3.0, 4.0])
            .unwrap()
            .into();
        let mut fits = Fits::new();
        fits.push(PrimaryHdu::new(image).unwrap()).unwrap();

        let mut table: Hdu = BinaryTable::with_columns(&[ColumnDef::new("RA", "D")], 4)
            .unwrap()
            .into();
        table.set_keyword("EXTNAME", "CATALOG").unwrap();
        fits.push(table).unwrap();

        let ascii = AsciiTable::with_columns(&[ColumnDef::new("NAME", "A8")], 2).unwrap();
        fits.push(ascii).unwrap();
        fits
    }

    #[test]
    fn parses_flags() {
        let a = args(&["--headers-only", "--cards", "-vv"]);
        assert!(a.headers_only);
        assert!(a.cards);
        assert!(!a.stats);
        assert_eq!(a.verbose, 2);
    }

    #[test]
    fn summary_lists_every_hdu() {
        let out = format_fits(&sample(), &args(&[]));
        assert!(out.contains("HDU 0: primary"));
        assert!(out.contains("Dimensions: 2 x 2"));
        assert!(out.contains("HDU 1: binary table (EXTNAME: CATALOG)"));
        assert!(out.contains("Rows: 4  Columns: 1"));
        assert!(out.contains("HDU 2: ASCII table"));
        assert!(!out.contains("Header cards:"));
    }

    #[test]
    fn stats_and_cards() {
        let out = format_fits(&sample(), &args(&["--stats", "--cards"]));
        assert!(out.contains("Stats: min 1 max 4 mean 2.500000 median 3"));
        assert!(out.contains("Header cards:"));
        assert!(out.contains("SIMPLE  ="));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let mut a = args(&[]);
        a.file = PathBuf::from("/nonexistent/in.fits");
        assert!(matches!(run(&a), Err(astrofits::Error::FileReading { .. })));
    }
}
