// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::project_root;
use pretty_assertions::assert_eq;
use specwatch_runner::{
    config::SpecwatchConfig,
    discovery::{group_by_folder, read_spec_source, scan_for_specs},
    title::TitleExtractor,
};

#[test]
fn scan_fixture_project() {
    let root = project_root();
    let config = SpecwatchConfig::from_sources(&root, None).expect("fixture config is valid");
    let extractor = TitleExtractor::new(config.extract());
    let specs = scan_for_specs(&root, config.discovery(), &extractor).expect("scan succeeded");

    let found: Vec<_> = specs
        .iter()
        .map(|spec| (spec.relative_path.as_str(), spec.title.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("test/e2e/cart.spec.ts", "Shopping Cart"),
            ("test/e2e/login.spec.js", "Login Page"),
            ("webapp/test/integration/smoke.test.js", "smoke.test.js"),
        ]
    );

    let folders: Vec<_> = group_by_folder(&specs)
        .into_iter()
        .map(|folder| {
            let names: Vec<_> = folder.specs.iter().map(|spec| spec.name.as_str()).collect();
            (folder.name, names)
        })
        .collect();
    assert_eq!(
        folders,
        vec![
            ("test/e2e", vec!["cart.spec.ts", "login.spec.js"]),
            ("webapp/test/integration", vec!["smoke.test.js"]),
        ]
    );
}

#[test]
fn nested_titles_are_flattened() {
    let root = project_root();
    let config = SpecwatchConfig::from_sources(&root, None).expect("fixture config is valid");
    let source =
        read_spec_source(&root.join("test/e2e/cart.spec.ts")).expect("fixture spec is readable");
    let outline = TitleExtractor::new(config.extract()).extract(&source);

    assert_eq!(outline.suite_title.as_deref(), Some("Shopping Cart"));
    assert_eq!(
        outline.test_titles,
        vec!["adds an item to the cart", "shows the order total"]
    );
}
