use std::error::Error;
use std::path::PathBuf;

use depwatch::errors::{DepwatchError, ResolveError};
use depwatch::fs::mock::MockFileSystem;
use depwatch::resolver::{RegexResolver, ResolverSettings, StaticResolver};

type TestResult = Result<(), Box<dyn Error>>;

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn specifiers_come_back_in_source_order_without_duplicates() {
    let resolver = RegexResolver::default();
    let src = r#"
import def from './b';
const a = require("./a");
export { x } from './c';
import './side-effect';
const again = require('./a');
const lazy = import('./lazy');
"#;
    assert_eq!(
        resolver.specifiers(src),
        vec!["./b", "./a", "./c", "./side-effect", "./lazy"]
    );
}

#[test]
fn bare_specifiers_are_not_references() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/proj/main.js",
        "const _ = require('lodash');\nconst u = require('./util');\nimport x from 'react';\n",
    );
    fs.add_file("/proj/util.js", "");

    let refs = RegexResolver::default().resolve(&fs, &p("/proj/main.js"))?;
    assert_eq!(refs, vec![p("/proj/util.js")]);
    Ok(())
}

#[test]
fn extension_and_index_probing() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/proj/src/main.js",
        "require('./exact.js');\nrequire('./noext');\nrequire('./data');\nrequire('../lib');\n",
    );
    fs.add_file("/proj/src/exact.js", "");
    fs.add_file("/proj/src/noext.mjs", "");
    fs.add_file("/proj/src/data.json", "{}");
    fs.add_file("/proj/lib/index.js", "");

    let refs = RegexResolver::default().resolve(&fs, &p("/proj/src/main.js"))?;
    assert_eq!(
        refs,
        vec![
            p("/proj/src/exact.js"),
            p("/proj/src/noext.mjs"),
            p("/proj/src/data.json"),
            p("/proj/lib/index.js"),
        ]
    );
    Ok(())
}

#[test]
fn missing_targets_get_a_best_guess_path() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(
        "/proj/main.js",
        "require('./later');\nrequire('./later.mjs');\nrequire('./a/../b/c');\n",
    );

    let refs = RegexResolver::default().resolve(&fs, &p("/proj/main.js"))?;
    assert_eq!(
        refs,
        vec![p("/proj/later.js"), p("/proj/later.mjs"), p("/proj/b/c.js")]
    );
    Ok(())
}

#[test]
fn two_specifiers_resolving_to_one_file_count_once() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/main.js", "require('./util');\nrequire('./util.js');\n");
    fs.add_file("/proj/util.js", "");

    let refs = RegexResolver::default().resolve(&fs, &p("/proj/main.js"))?;
    assert_eq!(refs, vec![p("/proj/util.js")]);
    Ok(())
}

#[test]
fn custom_patterns_and_extensions() -> TestResult {
    let settings = ResolverSettings {
        patterns: vec![r#"(?m)^#include\s+"([^"]+)""#.to_string()],
        extensions: vec![".h".to_string()],
        index_files: vec!["index".to_string()],
    };
    let resolver = RegexResolver::new(&settings)?;

    let fs = MockFileSystem::new();
    fs.add_file(
        "/proj/main.c",
        "#include \"./util\"\n#include <stdio.h>\nrequire('./ignored');\n",
    );
    fs.add_file("/proj/util.h", "");

    assert_eq!(resolver.resolve(&fs, &p("/proj/main.c"))?, vec![p("/proj/util.h")]);
    Ok(())
}

#[test]
fn invalid_or_captureless_patterns_are_config_errors() {
    let bad = ResolverSettings {
        patterns: vec!["require(".to_string()],
        ..ResolverSettings::default()
    };
    assert!(matches!(
        RegexResolver::new(&bad),
        Err(DepwatchError::ConfigError(_))
    ));

    let no_group = ResolverSettings {
        patterns: vec!["require".to_string()],
        ..ResolverSettings::default()
    };
    let err = RegexResolver::new(&no_group).unwrap_err();
    assert!(err.to_string().contains("capture group"), "{err}");
}

#[test]
fn unreadable_and_undecodable_files() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/binary.js", vec![0xff, 0xfe, 0x00]);
    let resolver = RegexResolver::default();

    match resolver.resolve(&fs, &p("/proj/missing.js")) {
        Err(ResolveError::Read { path, .. }) => assert_eq!(path, p("/proj/missing.js")),
        other => panic!("expected read error, got {other:?}"),
    }
    match resolver.resolve(&fs, &p("/proj/binary.js")) {
        Err(err @ ResolveError::Parse { .. }) => {
            assert_eq!(err.path(), &p("/proj/binary.js"))
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn forced_read_failures_run_out() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/main.js", "");
    fs.fail_next_reads("/proj/main.js", 1);
    let resolver = RegexResolver::default();

    assert!(resolver.resolve(&fs, &p("/proj/main.js")).is_err());
    assert!(resolver.resolve(&fs, &p("/proj/main.js"))?.is_empty());
    Ok(())
}
