use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use clover::compiler::compile;
use clover::decompiler::decompile;
use clover::native::NativeCore;
use clover::vm::{Host, Interpreter};

/// Loop iterations to run per `-x` test after init.
const NUM_LOOPS: u32 = 0;

/// ROM window of the simulated device.
const ROM_SIZE: usize = 1024;

#[derive(Debug, Deserialize)]
struct TestSpec {
    cmd: String,
    #[serde(default)]
    params: Vec<u8>,
}

/// Simulator host: the image in a fixed ROM window, log to stdout.
struct SimHost {
    rom: [u8; ROM_SIZE],
}

impl SimHost {
    fn new(image: &[u8]) -> Self {
        let mut rom = [0u8; ROM_SIZE];
        let n = image.len().min(ROM_SIZE);
        rom[..n].copy_from_slice(&image[..n]);
        Self { rom }
    }
}

impl Host for SimHost {
    fn rom(&self, i: u16) -> u8 {
        self.rom.get(i as usize).copied().unwrap_or(0)
    }

    fn log(&mut self, s: &str) {
        print!("{}", s);
    }
}

struct Flags {
    decompile: bool,
    execute: bool,
    segmented: bool,
    header_file: bool,
}

fn main() {
    process::exit(run(env::args().skip(1).collect()));
}

fn run(args: Vec<String>) -> i32 {
    println!("Clover Compiler v0.2\n");

    let mut flags = Flags { decompile: false, execute: false, segmented: false, header_file: false };
    let mut inputs: Vec<String> = Vec::new();

    for arg in args {
        match arg.as_str() {
            "-d" => flags.decompile = true,
            "-x" => flags.execute = true,
            "-s" => flags.segmented = true,
            "-h" => flags.header_file = true,
            other if other.starts_with('-') => {
                println!("unknown flag '{}'\n\n{}", other, usage());
                return 0;
            }
            other => inputs.push(other.to_string()),
        }
    }

    // Header-file output supersedes segmenting.
    if flags.header_file {
        flags.segmented = false;
    }

    if inputs.is_empty() {
        println!("{}", usage());
        return 0;
    }

    for input in &inputs {
        if let Err(msg) = process_file(input, &flags) {
            println!("{}", msg);
            return -1;
        }
    }
    1
}

fn usage() -> String {
    [
        "usage: clover [-d] [-x] [-s] [-h] <input>...",
        "  -d  decompile and print the produced image",
        "  -x  execute the test command list after compilation",
        "  -s  split the image into 64-byte segments (<base>NN.arlx)",
        "  -h  emit the image as a C include file (<base>.h)",
        "input suffixes: .clvr (Clover source)",
    ]
    .join("\n")
}

fn process_file(input: &str, flags: &Flags) -> Result<(), String> {
    let path = Path::new(input);
    let suffix = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match suffix {
        "clvr" => {}
        "arly" => {
            return Err(format!("Compile failed: unrecognized language ('{}')", input));
        }
        other => {
            return Err(format!("suffix '{}' not recognized", other));
        }
    }

    let src = fs::read_to_string(path).map_err(|e| format!("can't open '{}': {}", input, e))?;

    println!("Compiling '{}'", input);
    let image = compile(&src).map_err(|e| format!("Compile failed: {}", e))?;
    println!("Compile succeeded!");

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out")
        .to_string();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    if flags.header_file {
        write_include(dir, &stem, &image)?;
    } else if flags.segmented {
        write_segments(dir, &stem, &image)?;
    } else {
        let out = dir.join(format!("{}.arlx", stem));
        fs::write(&out, &image).map_err(|e| format!("save failed: {}", e))?;
        println!("    Saved {}", out.display());
    }

    if flags.decompile {
        match decompile(&image) {
            Ok(text) => println!("\nDecompiled executable:\n{}\nEnd decompilation\n", text),
            Err(e) => return Err(format!("Decompile failed: {}", e)),
        }
    }

    if flags.execute {
        execute_tests(dir, &stem, &image)?;
    }
    Ok(())
}

/// 64-byte chunks, each prefixed with its 16-bit load address.
fn write_segments(dir: &Path, stem: &str, image: &[u8]) -> Result<(), String> {
    for (i, chunk) in image.chunks(64).enumerate() {
        let name: PathBuf = dir.join(format!("{}{:02}.arlx", stem, i));
        let addr = (i * 64) as u16;
        let mut buf = Vec::with_capacity(chunk.len() + 2);
        buf.extend_from_slice(&addr.to_le_bytes());
        buf.extend_from_slice(chunk);
        fs::write(&name, &buf).map_err(|e| format!("save failed: {}", e))?;
        println!("    Saved {}", name.display());
    }
    Ok(())
}

/// Arduino-style include file for uploading the image to EEPROM.
fn write_include(dir: &Path, stem: &str, image: &[u8]) -> Result<(), String> {
    let mut out = String::new();
    out.push_str(&format!(
        "static const uint8_t PROGMEM EEPROM_Upload_{}[ ] = {{\n",
        stem
    ));
    for (i, b) in image.iter().enumerate() {
        out.push_str(&format!("0x{:02x}, ", b));
        if i % 8 == 7 {
            out.push('\n');
        }
    }
    out.push_str("};\n");
    out.push_str(&format!(
        "static constexpr uint16_t EEPROM_Upload_{}_Size = {};\n",
        stem,
        image.len()
    ));

    let name = dir.join(format!("{}.h", stem));
    fs::write(&name, out).map_err(|e| format!("save failed: {}", e))?;
    println!("    Saved {}", name.display());
    Ok(())
}

/// Run the test command list against the simulator. The list comes from
/// `<base>.tests.json` next to the input when present.
fn execute_tests(dir: &Path, stem: &str, image: &[u8]) -> Result<(), String> {
    let tests = load_tests(dir, stem)?;
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(1);

    for test in &tests {
        println!("Running '{}' command...", test.cmd);

        let mut host = SimHost::new(image);
        let mut vm = Interpreter::with_core(&mut host, NativeCore::with_seed(seed));

        let mut result = vm.init(&test.cmd, &test.params);
        if result >= 0 {
            for i in 0..NUM_LOOPS {
                result = vm.run_loop();
                if result < 0 {
                    break;
                }
                println!("[{}]: delay = {}", i, result);
            }
        }

        if result < 0 {
            let mut msg = format!("Interpreter failed: {}", vm.error());
            if vm.error_addr() >= 0 {
                msg.push_str(&format!(" at addr {}", vm.error_addr()));
            }
            println!("{}\n", msg);
        } else {
            println!("Complete\n");
        }
    }
    Ok(())
}

fn load_tests(dir: &Path, stem: &str) -> Result<Vec<TestSpec>, String> {
    let path = dir.join(format!("{}.tests.json", stem));
    if !path.exists() {
        return Ok(vec![TestSpec { cmd: "test".to_string(), params: Vec::new() }]);
    }
    let raw = fs::read_to_string(&path)
        .map_err(|e| format!("can't open '{}': {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("bad test list '{}': {}", path.display(), e))
}
