use std::fs;

use ninjagen_lib::config::Config;
use ninjagen_lib::generate::Generator;
use ninjagen_lib::manifest::Package;
use tempfile::TempDir;

const MANIFEST: &str = r#"
[variables]
cc = "gcc"
cflags = { config = "cc.flags", default = "-O2" }
srcs = { glob = "src/*.c", exclude = ["src/*_test.c"] }
all_srcs = { glob = "src/*.c", exclude = ["src/*_test.c"] }
objdir = "obj"

[rules.cc]
command = "$cc $cflags -c $in -o $out"
description = "CC $out"
depfile = "$out.d"
deps = "gcc"

[rules.ar]
command = "ar rcs $out $in"
rspfile = "$out.rsp"
rspfile_content = "$in"

[[builds]]
rule = "cc"
outputs = ["$objdir/a.o"]
inputs = ["src/a.c"]

[[builds]]
rule = "cc"
outputs = ["$objdir/b.o"]
inputs = ["src/b.c"]

[[builds]]
rule = "ar"
outputs = ["lib.a"]
inputs = ["$objdir/a.o", "$objdir/b.o"]
default = true

[[builds]]
rule = "phony"
outputs = ["sources"]
inputs = ["$srcs", "$all_srcs"]
"#;

fn project() -> TempDir {
  let temp = TempDir::new().unwrap();
  fs::create_dir_all(temp.path().join("src")).unwrap();
  for file in ["a.c", "b.c", "a_test.c"] {
    fs::write(temp.path().join("src").join(file), "").unwrap();
  }
  fs::write(temp.path().join("ninjagen.toml"), MANIFEST).unwrap();
  temp
}

#[test]
fn generates_ninja_file_from_manifest() {
  let temp = project();
  let package = Package::load(&temp.path().join("ninjagen.toml")).unwrap();
  let output = temp.path().join("build.ninja");

  let report = Generator::new(Config::new(), temp.path())
    .generate_file(package.statements(), &output)
    .unwrap();

  let text = fs::read_to_string(&output).unwrap();
  assert!(text.contains("objdir = obj\n"), "{text}");
  assert!(text.contains("rule cc\n  command = ${cc} ${cflags} -c ${in} -o ${out}\n  depfile = ${out}.d\n  deps = gcc\n"));
  assert!(text.contains("rule ar\n  command = ar rcs ${out} ${in}\n  rspfile = ${out}.rsp\n  rspfile_content = ${in}\n"));
  assert!(text.contains("build obj/a.o: cc src/a.c\n"));
  assert!(text.contains("build lib.a: ar obj/a.o obj/b.o\n"));
  assert!(text.contains("build sources: phony src/a.c src/b.c src/a.c src/b.c\n"));
  assert!(text.ends_with("default lib.a\n"));

  assert_eq!(report.submitted, 4);
  assert!(report.discarded.is_empty());
  assert_eq!(report.live.rules, 2);
}

#[test]
fn identical_globs_are_walked_once() {
  let temp = project();
  let package = Package::load(&temp.path().join("ninjagen.toml")).unwrap();

  let generation = Generator::new(Config::new(), temp.path())
    .discover(package.statements())
    .unwrap();

  assert_eq!(generation.report.globs.len(), 1);
  assert_eq!(generation.tracker.context().glob_walks(), 1);
  assert_eq!(generation.report.globs[0].matches, vec!["src/a.c", "src/b.c"]);
}

#[test]
fn config_file_overrides_defaults() {
  let temp = project();
  fs::write(temp.path().join("config.toml"), "[cc]\nflags = \"-O0 -g\"\n").unwrap();
  let config = Config::load(&temp.path().join("config.toml")).unwrap();
  let package = Package::load(&temp.path().join("ninjagen.toml")).unwrap();

  let mut out = Vec::new();
  Generator::new(config, temp.path())
    .generate(package.statements(), &mut out)
    .unwrap();

  let text = String::from_utf8(out).unwrap();
  assert!(text.contains("cflags = -O0 -g\n"), "{text}");
}

#[test]
fn unsubmitted_declarations_are_not_evaluated() {
  let temp = project();
  // `broken` would fail to resolve, but no build reaches it.
  let toml = r#"
    [variables]
    needed = "x"
    broken = { config = "never.set" }

    [[builds]]
    rule = "phony"
    outputs = ["$needed"]
  "#;
  fs::write(temp.path().join("small.toml"), toml).unwrap();
  let package = Package::load(&temp.path().join("small.toml")).unwrap();

  let generation = Generator::new(Config::new(), temp.path())
    .discover(package.statements())
    .unwrap();

  assert!(generation.tracker.is_variable_live(package.variable("needed").unwrap()));
  assert!(!generation.tracker.is_variable_live(package.variable("broken").unwrap()));
}
