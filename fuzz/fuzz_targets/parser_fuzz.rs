#![no_main]
use libfuzzer_sys::fuzz_target;

const SUBCOMMANDS: [&str; 4] = ["encode", "decode", "inspect", "config"];

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let mut args = vec![SUBCOMMANDS[first as usize % SUBCOMMANDS.len()].to_string()];
    args.extend(text.split_whitespace().take(32).map(str::to_string));
    rolldelta::cli::fuzz_try_parse_args(&args);
});
