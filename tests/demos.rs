use std::fs;

use slang::run_with_output;
use walkdir::WalkDir;

/// Every `demos/*.sl` program starts with a `# expect: <number>` line.
#[test]
fn demo_programs_produce_their_expected_result() {
    let mut count = 0;

    for entry in WalkDir::new("demos")
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "sl"))
    {
        let path = entry.path();
        let source =
            fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {path:?}: {e}"));

        let expected = source
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("# expect:"))
            .and_then(|value| value.trim().parse::<f64>().ok())
            .unwrap_or_else(|| panic!("{path:?} has no `# expect:` header"));

        match run_with_output(&source, std::io::sink()) {
            Ok(value) => assert_eq!(value, expected, "{path:?} returned the wrong result"),
            Err(e) => panic!("{path:?} failed: {e}"),
        }
        count += 1;
    }

    assert!(count > 0, "No demo programs found in demos/");
}
