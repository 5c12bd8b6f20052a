use std::path::PathBuf;

use clap::Parser;
use env_logger::Target;
use lofasm_convert::{parse_channel_list, ConversionPipeline, ConvertConfig, DEFAULT_CHANNEL_LIST};
use lofasm_types::PayloadEncoding;
use log::{debug, error, info, LevelFilter};

#[derive(Parser, Debug)]
#[command(
    name = "loco2bx",
    version = env!("CARGO_PKG_VERSION"),
    about = "Convert LoCo record-container captures into gzipped .bbx/.abx filterbank files",
    long_about = "Convert LoCo record-container captures into gzipped .bbx/.abx filterbank files.\n\n\
                  Inputs must use the BRST/INTG record framing written by lofasm-core's LocoWriter; \
                  raw station .lofasm recordings are not read directly.",
)]
struct Cli {
    /// Входные записи (.lofasm или .lofasm.gz)
    #[arg(value_name = "INFILE", required = true)]
    files: Vec<PathBuf>,
    /// Писать ASCII (.abx) вместо двоичного .bbx
    #[arg(short, long)]
    ascii: bool,
    /// Перезаписывать существующие архивы
    #[arg(short, long)]
    force: bool,
    /// Каналы через запятую
    #[arg(short, long, default_value = DEFAULT_CHANNEL_LIST)]
    pols: String,
    /// Каталог для выходных файлов
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    /// Не удалять .hdr / .dat после сборки архива
    #[arg(long)]
    keep_temp: bool,
    /// Тихий режим (только ошибки)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
    /// Подробный вывод
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (_, true) => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };

    // Сообщения о пропусках идут в stdout
    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp(None)
        .target(Target::Stdout)
        .init();

    let channels = match parse_channel_list(&cli.pols) {
        Ok(c) => c,
        Err(e) => {
            error!("--pols: {e}");
            std::process::exit(1);
        }
    };

    let encoding = if cli.ascii {
        PayloadEncoding::Ascii
    } else {
        PayloadEncoding::Binary
    };

    let config = ConvertConfig {
        encoding,
        force: cli.force,
        channels,
        output_dir: cli.output_dir,
        keep_temporaries: cli.keep_temp,
    };

    debug!("{config:?}");

    let summary = ConversionPipeline::new(config).run(&cli.files);

    debug!("\n{summary}");
    info!("{}", summary.headline());
}
