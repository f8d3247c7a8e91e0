//! Build script for f4drv-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates board.toml and turns it into `board_config.rs` constants

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    setup_linker(&out_dir);
    let board = validate_config();
    emit_board_config(&out_dir, &board);
}

/// Set up linker search paths for memory.x
fn setup_linker(out_dir: &Path) {
    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Board settings after validation
struct Board {
    clock_source: &'static str,
    ahb_div: i64,
    apb1_div: i64,
    apb2_div: i64,
    console_baud: i64,
    i2c_speed_hz: i64,
    i2c_own_address: i64,
    i2c_sensor_address: i64,
    spi_divider: i64,
}

const CLOCK_SOURCES: [(&str, &str); 3] = [
    ("hsi", "Hsi"),
    ("hse_crystal", "HseCrystal"),
    ("hse_bypass", "HseBypass"),
];
const AHB_DIVS: [i64; 9] = [1, 2, 4, 8, 16, 64, 128, 256, 512];
const APB_DIVS: [i64; 5] = [1, 2, 4, 8, 16];
const SPI_DIVS: [i64; 8] = [2, 4, 8, 16, 32, 64, 128, 256];

/// Nominal oscillator frequencies, matching `SysClockSource::nominal_hz`
const HSI_HZ: i64 = 16_000_000;
const HSE_HZ: i64 = 8_000_000;

/// Validate board.toml configuration at compile time
fn validate_config() -> Board {
    // Re-run if board.toml changes
    println!("cargo:rerun-if-changed=board.toml");

    let config_path = Path::new("board.toml");

    // Check if config file exists
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: board.toml not found!                                    ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a board.toml configuration file.          ║\n\
            ║  Please create one in the f4drv-firmware directory.              ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read board.toml                                ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    // Parse and validate TOML syntax
    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in board.toml                        ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    for section in ["clock", "console", "i2c", "spi"] {
        if config.get(section).and_then(|s| s.as_table()).is_none() {
            errors.push(format!("Missing [{}] section", section));
        }
    }
    report("Missing required sections in board.toml", &errors);

    let board = Board {
        clock_source: validate_clock_source(&config, &mut errors),
        ahb_div: validate_choice(&config, "clock", "ahb_div", &AHB_DIVS, &mut errors),
        apb1_div: validate_choice(&config, "clock", "apb1_div", &APB_DIVS, &mut errors),
        apb2_div: validate_choice(&config, "clock", "apb2_div", &APB_DIVS, &mut errors),
        console_baud: validate_range(&config, "console", "baud", 1_200, 3_000_000, &mut errors),
        i2c_speed_hz: validate_range(&config, "i2c", "speed_hz", 1_000, 400_000, &mut errors),
        i2c_own_address: validate_range(&config, "i2c", "own_address", 0x08, 0x77, &mut errors),
        i2c_sensor_address: validate_range(
            &config,
            "i2c",
            "sensor_address",
            0x08,
            0x77,
            &mut errors,
        ),
        spi_divider: validate_choice(&config, "spi", "divider", &SPI_DIVS, &mut errors),
    };
    report("Invalid board configuration", &errors);

    validate_clock_tree(&board, &mut errors);
    report("Clock tree out of range", &errors);

    println!("cargo:warning=board.toml validated successfully");
    board
}

fn validate_clock_source(config: &toml::Value, errors: &mut Vec<String>) -> &'static str {
    match config.get("clock").and_then(|c| c.get("source")) {
        Some(toml::Value::String(source)) => {
            match CLOCK_SOURCES.iter().find(|(key, _)| key == source) {
                Some((_, variant)) => *variant,
                None => {
                    errors.push(
                        "[clock] source must be 'hsi', 'hse_crystal' or 'hse_bypass'".to_string(),
                    );
                    "Hsi"
                }
            }
        }
        _ => {
            errors.push("[clock] missing 'source'".to_string());
            "Hsi"
        }
    }
}

fn integer(
    config: &toml::Value,
    section: &str,
    key: &str,
    errors: &mut Vec<String>,
) -> Option<i64> {
    match config.get(section).and_then(|s| s.get(key)) {
        Some(toml::Value::Integer(value)) => Some(*value),
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            None
        }
        None => {
            errors.push(format!("[{}] missing '{}'", section, key));
            None
        }
    }
}

fn validate_choice(
    config: &toml::Value,
    section: &str,
    key: &str,
    allowed: &[i64],
    errors: &mut Vec<String>,
) -> i64 {
    let Some(value) = integer(config, section, key, errors) else {
        return allowed[0];
    };
    if !allowed.contains(&value) {
        errors.push(format!("[{}] {} must be one of {:?}", section, key, allowed));
        return allowed[0];
    }
    value
}

fn validate_range(
    config: &toml::Value,
    section: &str,
    key: &str,
    min: i64,
    max: i64,
    errors: &mut Vec<String>,
) -> i64 {
    let Some(value) = integer(config, section, key, errors) else {
        return min;
    };
    if value < min || value > max {
        errors.push(format!("[{}] {} must be {}-{}", section, key, min, max));
        return min;
    }
    value
}

/// Bus limits of the STM32F407: APB1 <= 42 MHz, APB2 <= 84 MHz, and I2C
/// needs at least 2 MHz on APB1
fn validate_clock_tree(board: &Board, errors: &mut Vec<String>) {
    let sysclk = match board.clock_source {
        "Hsi" => HSI_HZ,
        _ => HSE_HZ,
    };
    let hclk = sysclk / board.ahb_div;
    let pclk1 = hclk / board.apb1_div;
    let pclk2 = hclk / board.apb2_div;

    if pclk1 > 42_000_000 {
        errors.push(format!("APB1 at {} Hz exceeds 42 MHz", pclk1));
    }
    if pclk2 > 84_000_000 {
        errors.push(format!("APB2 at {} Hz exceeds 84 MHz", pclk2));
    }
    if pclk1 < 2_000_000 {
        errors.push(format!("APB1 at {} Hz is below the 2 MHz I2C minimum", pclk1));
    }
    // USART2 sits on APB1; BRR mantissa must be non-zero at 16x oversampling
    if pclk1 / (16 * board.console_baud) == 0 {
        errors.push(format!(
            "console baud {} unreachable from APB1 at {} Hz",
            board.console_baud, pclk1
        ));
    }
}

/// Write board constants consumed by `src/board.rs`
fn emit_board_config(out_dir: &Path, board: &Board) {
    let mut f = File::create(out_dir.join("board_config.rs")).unwrap();
    writeln!(f, "// Generated by build.rs from board.toml").unwrap();
    writeln!(
        f,
        "pub const CLOCK: ClockConfig = ClockConfig {{ \
         source: SysClockSource::{}, \
         ahb: AhbPrescaler::Div{}, \
         apb1: ApbPrescaler::Div{}, \
         apb2: ApbPrescaler::Div{} }};",
        board.clock_source, board.ahb_div, board.apb1_div, board.apb2_div
    )
    .unwrap();
    writeln!(f, "pub const CONSOLE_BAUD: u32 = {};", board.console_baud).unwrap();
    writeln!(f, "pub const I2C_SPEED_HZ: u32 = {};", board.i2c_speed_hz).unwrap();
    writeln!(f, "pub const I2C_OWN_ADDRESS: u8 = {:#04x};", board.i2c_own_address).unwrap();
    writeln!(
        f,
        "pub const I2C_SENSOR_ADDRESS: u8 = {:#04x};",
        board.i2c_sensor_address
    )
    .unwrap();
    writeln!(
        f,
        "pub const SPI_DIVIDER: BaudDivider = BaudDivider::Div{};",
        board.spi_divider
    )
    .unwrap();
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Abort the build with every collected error
fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}
