use std::{env, fs, process::ExitCode};

use wisp::{render, run_source, InMemorySource};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path: &str = if args.len() > 1 { &args[1] } else { "example.wisp" };
    let code = match read_file(file_path) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let source = InMemorySource::new(file_path, code.clone());
    match run_source(&source) {
        Ok(output) => {
            println!("{}", output.inspect());
            ExitCode::SUCCESS
        }
        Err(diagnostics) => {
            for diag in &diagnostics {
                eprintln!("{}", render(diag, code.as_bytes()));
            }
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) if !metadata.is_file() => return Err(format!("{file_path} is not a file")),
        Ok(_) => {}
        Err(err) => return Err(format!("reading {file_path}: {err}")),
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}
