//! Dissects packets typed at the prompt.
//!
//! Each line is `<src> <dst> <hex bytes>`, where an endpoint is either a number
//! or `host`. `pending` lists incomplete messages and `reset` forgets them.
//! Pages of print data are reported as they end.

use capt_dissect::{
    Dissector, EndpointId, HOST_ENDPOINT, RasterCollector, RawPacket, protocol::Command,
};
use rustyline::{DefaultEditor, error::ReadlineError};

fn endpoint(word: &str) -> Option<EndpointId> {
    match word {
        "host" => Some(HOST_ENDPOINT),
        _ => word.parse().ok(),
    }
}

fn print_command(command: &Command, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}{} {:#06X} [{:?}] {} byte(s) {:?}",
        command.mnemonic, command.opcode, command.classification, command.declared_size, command.flags
    );
    for field in &command.fields {
        println!("{indent}  {field}");
    }
    for child in &command.children {
        print_command(child, depth + 1);
    }
}

fn main() -> Result<(), ReadlineError> {
    simplelog::TermLogger::init(
        log::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    let mut editor = DefaultEditor::new()?;
    let mut dissector = Dissector::default();
    let mut raster = RasterCollector::new();
    let mut sequence = 0;

    loop {
        let line = match editor.readline("capt >> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        match line {
            "reset" => {
                dissector.reset();
                raster = RasterCollector::new();
                continue;
            }
            "pending" => {
                let tracker = dissector.tracker();
                for channel in tracker.pending_channels() {
                    if let Some(segment) = tracker.pending(channel) {
                        println!(
                            "[{channel}] {:#06X} from #{}, {} byte(s) to go",
                            segment.header().opcode,
                            segment.header_sequence(),
                            segment.remaining()
                        );
                    }
                }
                continue;
            }
            _ => {}
        }

        let mut words = line.splitn(3, char::is_whitespace);
        let (Some(src), Some(dst)) = (
            words.next().and_then(endpoint),
            words.next().and_then(endpoint),
        ) else {
            eprintln!("Expected `<src> <dst> <hex bytes>`.");
            continue;
        };

        sequence += 1;
        let packet = match RawPacket::from_hex(sequence, src, dst, words.next().unwrap_or_default()) {
            Ok(packet) => packet,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        let output = dissector.feed(&packet);
        for dissected in &output.commands {
            println!(
                "#{}..#{} [{}]",
                dissected.sequence, dissected.completed_sequence, dissected.channel
            );
            print_command(&dissected.command, 1);
            for page in raster.push(&dissected.command) {
                println!("page {}: {}", page.number, page.raw_header().trim_end().replace('\n', " "));
            }
        }
        for diagnostic in &output.diagnostics {
            println!("{diagnostic} ({:?})", diagnostic.category());
        }
    }

    Ok(())
}
