use clover::compiler::compile;

fn check_golden(src: &str, expected: &[u8]) {
    let got = compile(src).expect("compile");
    if got != expected {
        panic!("{}", image_mismatch(expected, &got));
    }
}

/// Describe how two images diverge: both lengths, the offset of the
/// first differing byte, and a hex window around it from each side.
fn image_mismatch(expected: &[u8], got: &[u8]) -> String {
    let first = expected
        .iter()
        .zip(got.iter())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| expected.len().min(got.len()));

    let window = |bytes: &[u8]| -> String {
        let lo = first.saturating_sub(4);
        let hi = (first + 8).min(bytes.len());
        if lo >= hi {
            return "<ended>".to_string();
        }
        bytes[lo..hi]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    };

    format!(
        "image mismatch ({} vs {} bytes), first difference at offset {:#06x}\n\
         expected ...{}...\n\
         got      ...{}...",
        expected.len(),
        got.len(),
        first,
        window(expected),
        window(got)
    )
}

#[test]
fn golden_minimal_return() {
    let src = "command test Init Loop; \
               function int Init() { return 42; } \
               function int Loop() { return 0; }";
    let expected: Vec<u8> = vec![
        // header
        b'a', b'r', b'l', b'y', // magic
        0x00, 0x00, // constants: 0 words
        0x00, 0x00, // globals: 0 words
        0x40, 0x00, // stack: 64 words
        0x00, 0x00, // reserved
        // command table
        b't', b'e', b's', b't', 0x00, 0x00, 0x00, // name, NUL-padded
        0x00, // param bytes
        0x00, 0x00, // init entry
        0x05, 0x00, // loop entry
        0x00, // terminator
        // Init
        0xc0, 0x00, // SetFrame 0 0
        0x01, 0x2a, // PushIntConst 42
        0x0b, // Return
        // Loop
        0xc0, 0x00, // SetFrame 0 0
        0xa0, // PushIntConstS 0
        0x0b, // Return
    ];
    check_golden(src, &expected);
}

#[test]
fn golden_interned_constant() {
    let src = "const int big 100000; \
               command test Init Init; \
               function int Init() { return big; }";
    let expected: Vec<u8> = vec![
        b'a', b'r', b'l', b'y',
        0x01, 0x00, // constants: 1 word
        0x00, 0x00,
        0x40, 0x00,
        0x00, 0x00,
        0xa0, 0x86, 0x01, 0x00, // 100000
        b't', b'e', b's', b't', 0x00, 0x00, 0x00,
        0x00,
        0x00, 0x00,
        0x00, 0x00,
        0x00,
        0xc0, 0x00, // SetFrame 0 0
        0x50, 0x00, // Push [0]
        0x0b, // Return
    ];
    check_golden(src, &expected);
}

#[test]
fn compilation_is_deterministic() {
    let src = "var int a[4]; struct P { int x; int y; } var P p; \
               command test Init Init; \
               function int Init() { \
                 for (int i = 0; i < 4; ++i) a[i] = i * i; \
                 p.x = a[2]; \
                 return p.x; }";
    let a = compile(src).expect("compile");
    let b = compile(src).expect("compile");
    assert_eq!(a, b);
}
