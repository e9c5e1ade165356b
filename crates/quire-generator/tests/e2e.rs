//! End-to-end tests for Quire.
//!
//! Each test lays out a small project in a temporary directory and runs a
//! full build over it.

use std::{fs, path::Path};

use quire_core::{Config, DocumentErrorPolicy};
use quire_generator::{AggregateError, BuildError, Builder, TemplateError};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap()
}

/// A project with the conventional layout and a pass-through default layout.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "src/templates/layouts/default.hbs",
        "{{{body}}}",
    );
    dir
}

fn abc_posts(dir: &Path) {
    for title in ["A", "B", "C"] {
        write(
            dir,
            &format!("src/posts/{}.hbs", title.to_lowercase()),
            &format!("---\ntitle: {title}\n---\n<h2>{{{{title}}}}</h2>"),
        );
    }
}

#[test]
fn test_collection_with_each() {
    let dir = project();
    abc_posts(dir.path());
    write(
        dir.path(),
        "src/pages/index.hbs",
        "---\ncollections:\n  items: src/posts/*.hbs\n---\n<ul>{{#each items}}<li>{{title}}</li>{{/each}}</ul>",
    );

    Builder::new(Config::default(), dir.path()).build().unwrap();

    assert_eq!(
        read(dir.path(), "dist/index.html"),
        "<ul><li>A</li><li>B</li><li>C</li></ul>"
    );
}

#[test]
fn test_md_pages_helper() {
    let dir = project();
    abc_posts(dir.path());
    write(
        dir.path(),
        "src/pages/index.hbs",
        r#"<ul>{{#md-pages "src/posts/*.hbs"}}<li>{{title}}</li>{{/md-pages}}</ul>"#,
    );
    write(
        dir.path(),
        "src/pages/full.hbs",
        r#"{{#md-pages "src/posts/*.hbs"}}{{{body}}}{{/md-pages}}"#,
    );

    Builder::new(Config::default(), dir.path()).build().unwrap();

    assert_eq!(
        read(dir.path(), "dist/index.html"),
        "<ul><li>A</li><li>B</li><li>C</li></ul>"
    );
    assert_eq!(
        read(dir.path(), "dist/full.html"),
        "<h2>A</h2><h2>B</h2><h2>C</h2>"
    );
}

fn five_posts_one_broken(dir: &Path) {
    for (i, name) in ["one", "two", "three", "four", "five"].iter().enumerate() {
        let content = if i == 2 {
            "---\ntitle: \"unterminated\n---\nbroken".to_string()
        } else {
            format!("---\ntitle: {name}\n---\n{{{{title}}}}")
        };
        write(dir, &format!("src/posts/{i}-{name}.hbs"), &content);
    }
    write(
        dir,
        "src/pages/index.hbs",
        r#"{{#md-pages "src/posts/*.hbs"}}[{{body}}]{{/md-pages}}"#,
    );
}

#[test]
fn test_skip_policy_renders_remaining_documents() {
    let dir = project();
    five_posts_one_broken(dir.path());

    let stats = Builder::new(Config::default(), dir.path()).build().unwrap();

    assert_eq!(stats.pages, 1);
    assert_eq!(
        read(dir.path(), "dist/index.html"),
        "[one][two][four][five]"
    );
}

#[test]
fn test_abort_policy_fails_the_build() {
    let dir = project();
    five_posts_one_broken(dir.path());

    let mut config = Config::default();
    config.build.on_document_error = DocumentErrorPolicy::Abort;

    let err = Builder::new(config, dir.path()).build().unwrap_err();
    let BuildError::Pages { failures, .. } = err else {
        panic!("expected page failures, got {err}");
    };

    assert_eq!(failures.len(), 1);
    match &failures[0].error {
        TemplateError::Aggregate(AggregateError::Document { path, .. }) => {
            assert!(path.ends_with("src/posts/2-three.hbs"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("dist/index.html").exists());
}

fn sitemap_project() -> TempDir {
    let dir = project();
    write(dir.path(), "src/pages/a.hbs", "---\ntitle: A\n---\na");
    write(
        dir.path(),
        "src/pages/sitemap.hbs",
        "---\ntitle: Sitemap\n---\n{{#md-pages \"src/pages/*.hbs\"}}[{{title}}]{{/md-pages}}",
    );
    dir
}

#[test]
fn test_page_aggregating_its_own_directory() {
    let dir = sitemap_project();

    let stats = Builder::new(Config::default(), dir.path()).build().unwrap();

    assert_eq!(stats.pages, 2);
    assert_eq!(read(dir.path(), "dist/sitemap.html"), "[A]");
}

#[test]
fn test_page_aggregating_itself_fails_under_abort() {
    let dir = sitemap_project();

    let mut config = Config::default();
    config.build.on_document_error = DocumentErrorPolicy::Abort;

    let err = Builder::new(config, dir.path()).build().unwrap_err();
    let BuildError::Pages { failures, stats } = err else {
        panic!("expected page failures, got {err}");
    };

    assert_eq!(stats.pages, 1);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].path.ends_with("src/pages/sitemap.hbs"));
    assert!(matches!(
        &failures[0].error,
        TemplateError::Aggregate(AggregateError::Document { cause, .. })
            if matches!(**cause, TemplateError::Aggregate(AggregateError::Cycle { .. }))
    ));
}

#[test]
fn test_unknown_helper_only_fails_referencing_page() {
    let dir = project();
    write(
        dir.path(),
        "src/templates/partials/fancy.hbs",
        "{{sparkle title}}",
    );
    write(dir.path(), "src/pages/plain.hbs", "---\ntitle: Plain\n---\n{{title}}");
    write(dir.path(), "src/pages/shiny.hbs", "---\ntitle: Shiny\n---\n{{> fancy}}");

    let err = Builder::new(Config::default(), dir.path())
        .build()
        .unwrap_err();
    let BuildError::Pages { failures, stats } = err else {
        panic!("expected page failures, got {err}");
    };

    assert_eq!(stats.pages, 1);
    assert_eq!(read(dir.path(), "dist/plain.html"), "Plain");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].path.ends_with("shiny.hbs"));
    assert!(matches!(
        &failures[0].error,
        TemplateError::UnknownHelper { name, .. } if name == "sparkle"
    ));
}

#[test]
fn test_context_precedence() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "src/config/site.yml",
        "title: Global\nfooter: shared\nbody: from data\n",
    );
    write(
        dir.path(),
        "src/templates/layouts/default.hbs",
        "---\nfooter: layout\nlang: en\n---\n<html lang=\"{{lang}}\"><h1>{{title}}</h1>{{{body}}}<footer>{{footer}}</footer></html>",
    );
    write(
        dir.path(),
        "src/pages/index.hbs",
        "---\ntitle: Page\nbody: from front matter\n---\n<p>{{title}}</p>",
    );

    Builder::new(Config::default(), dir.path()).build().unwrap();

    assert_eq!(
        read(dir.path(), "dist/index.html"),
        "<html lang=\"en\"><h1>Page</h1><p>Page</p><footer>layout</footer></html>"
    );
}

#[test]
fn test_layout_selection_and_partials() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "src/templates/layouts/default.hbs",
        "<main>{{> nav}}{{{body}}}</main>",
    );
    write(
        dir.path(),
        "src/templates/layouts/post.hbs",
        "<article>{{{body}}}</article>",
    );
    write(dir.path(), "src/templates/partials/nav.hbs", "<nav>{{site}}</nav>");
    write(dir.path(), "src/config/site.json", r#"{"site": "Quire"}"#);
    write(dir.path(), "src/pages/index.hbs", "home");
    write(dir.path(), "src/pages/entry.hbs", "---\nlayout: post\n---\nentry");
    write(dir.path(), "src/pages/raw.hbs", "---\nlayout: false\n---\nraw");
    write(dir.path(), "quire.toml", "[paths]\nlayouts = [\"src/templates/layouts/*.hbs\"]\n");

    let config = Config::load(&dir.path().join("quire.toml")).unwrap();
    Builder::new(config, dir.path()).build().unwrap();

    assert_eq!(
        read(dir.path(), "dist/index.html"),
        "<main><nav>Quire</nav>home</main>"
    );
    assert_eq!(read(dir.path(), "dist/entry.html"), "<article>entry</article>");
    assert_eq!(read(dir.path(), "dist/raw.html"), "raw");
}

#[test]
fn test_unresolved_layout_is_reported() {
    let dir = project();
    write(dir.path(), "src/pages/index.hbs", "---\nlayout: fancy\n---\nx");

    let err = Builder::new(Config::default(), dir.path())
        .build()
        .unwrap_err();
    let BuildError::Pages { failures, .. } = err else {
        panic!("expected page failures, got {err}");
    };
    assert!(matches!(
        &failures[0].error,
        TemplateError::UnresolvedLayout { name, .. } if name == "fancy"
    ));
}

#[test]
fn test_assets_and_custom_extension() {
    let dir = project();
    write(dir.path(), "src/pages/index.hbs", "<link href=\"{{assets}}/css/site.css\">");
    write(dir.path(), "src/assets/css/site.css", "body {}");
    write(dir.path(), "vendor/d3/d3.js", "full");
    write(dir.path(), "vendor/d3/d3.min.js", "min");
    write(
        dir.path(),
        "quire.toml",
        r#"
[[assets]]
source = "src/assets"
dest = "assets"

[[assets]]
source = "vendor/d3"
dest = "assets/js"
include = ["d3.min.js"]

[build]
ext = ".htm"
"#,
    );

    let config = Config::load(&dir.path().join("quire.toml")).unwrap();
    let stats = Builder::new(config, dir.path()).build().unwrap();

    assert_eq!(stats.assets, 2);
    assert_eq!(
        read(dir.path(), "dist/index.htm"),
        "<link href=\"assets/css/site.css\">"
    );
    assert!(dir.path().join("dist/assets/js/d3.min.js").exists());
    assert!(!dir.path().join("dist/assets/js/d3.js").exists());
}

#[test]
fn test_rebuild_is_deterministic() {
    let dir = project();
    abc_posts(dir.path());
    write(dir.path(), "src/config/a.json", r#"{"x": 1, "y": [1, 2]}"#);
    write(dir.path(), "src/config/b.yml", "x: 2\nz: {k: v}\n");
    write(
        dir.path(),
        "src/pages/index.hbs",
        r#"{{x}}{{#each y}}{{this}}{{/each}}{{z.k}}{{#md-pages "src/posts/*.hbs"}}{{title}}{{/md-pages}}"#,
    );

    Builder::new(Config::default(), dir.path()).build().unwrap();
    let first = read(dir.path(), "dist/index.html");
    Builder::new(Config::default(), dir.path()).build().unwrap();
    let second = read(dir.path(), "dist/index.html");

    assert_eq!(first, "212vABC");
    assert_eq!(first, second);
}

#[test]
fn test_demo_site_builds() {
    let root = Path::new("../../demos/site");
    if !root.join("quire.toml").exists() {
        // Skip if running from a different working directory
        return;
    }

    let out = TempDir::new().unwrap();
    let config = Config::load(&root.join("quire.toml")).expect("config should load");
    let stats = Builder::new(config, root)
        .with_output_dir(out.path())
        .build()
        .expect("demo site should build");

    assert!(stats.pages >= 1);
    let index = read(out.path(), "index.html");
    assert!(index.contains("<li>"));
}
