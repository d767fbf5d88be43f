//! Out-of-band frames interleaved with data must not change what the data
//! channel reads.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread;

use proptest::prelude::*;
use protocol::{MessageCode, WireReader, WireWriter};

#[derive(Clone, Debug)]
enum Step {
    Data(Vec<u8>),
    Info(Vec<u8>),
    Flush,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..3000).prop_map(Step::Data),
        2 => prop::collection::vec(any::<u8>(), 0..200).prop_map(Step::Info),
        1 => Just(Step::Flush),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn log_frames_are_invisible_to_data_reads(steps in prop::collection::vec(step(), 1..24)) {
        logging::clear_sink();
        let (tx, rx) = UnixStream::pair().unwrap();
        let expected: Vec<u8> = steps
            .iter()
            .filter_map(|s| match s {
                Step::Data(d) => Some(d.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect();
        let infos = steps.iter().filter(|s| matches!(s, Step::Info(_))).count() as u64;

        let writer = thread::spawn(move || {
            let mut out = WireWriter::new(tx);
            out.set_multiplexed(true);
            for s in steps {
                match s {
                    Step::Data(d) => out.write_all(&d).unwrap(),
                    Step::Info(m) => out.write_message(MessageCode::Info, &m).unwrap(),
                    Step::Flush => out.flush().unwrap(),
                }
            }
            out.flush().unwrap();
        });

        let mut input = WireReader::new(rx);
        input.set_multiplexed(true);
        let mut got = vec![0u8; expected.len()];
        input.read_exact(&mut got).unwrap();
        writer.join().unwrap();

        // Trailing log frames are only seen once someone reads past the data.
        let mut rest = Vec::new();
        input.read_to_end(&mut rest).ok();

        prop_assert_eq!(got, expected);
        prop_assert!(rest.is_empty());
        prop_assert_eq!(input.out_of_band().frames(), infos);
        prop_assert_eq!(input.out_of_band().errors(), 0);
    }
}

#[test]
fn error_frames_are_counted() {
    logging::clear_sink();
    let (tx, rx) = UnixStream::pair().unwrap();
    let mut out = WireWriter::new(tx);
    out.set_multiplexed(true);
    out.write_all(b"abc").unwrap();
    out.write_message(MessageCode::Error, b"disk full\n").unwrap();
    out.write_all(b"def").unwrap();
    out.flush().unwrap();
    drop(out);

    let mut input = WireReader::new(rx);
    input.set_multiplexed(true);
    let mut got = [0u8; 6];
    input.read_exact(&mut got).unwrap();
    assert_eq!(&got, b"abcdef");
    assert_eq!(input.out_of_band().errors(), 1);
    assert!(logging::drain_events().iter().any(
        |e| matches!(e, logging::DiagnosticEvent::Error(m) if m.contains("disk full"))
    ));
}
