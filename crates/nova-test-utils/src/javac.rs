use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct JavacOptions {
    /// Passes `-g` so that `LocalVariableTable`/`LocalVariableTypeTable` are emitted.
    pub debug_info: bool,
}

impl Default for JavacOptions {
    fn default() -> Self {
        Self { debug_info: true }
    }
}

#[derive(Debug)]
pub struct JavacOutput {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl JavacOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Compiled classes living in a temporary directory that is removed on drop.
#[derive(Debug)]
pub struct CompiledClasses {
    dir: TempDir,
    pub output: JavacOutput,
}

impl CompiledClasses {
    /// Root of the emitted class tree, usable as a classpath directory entry.
    pub fn classes_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}

/// Compiles `files` (`(relative path, source)`) with the default options.
pub fn compile_java(files: &[(&str, &str)]) -> io::Result<CompiledClasses> {
    compile_java_with_options(files, &JavacOptions::default())
}

pub fn compile_java_with_options(
    files: &[(&str, &str)],
    opts: &JavacOptions,
) -> io::Result<CompiledClasses> {
    let dir = TempDir::new()?;
    for (name, src) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, src)?;
    }
    let output = run_javac(dir.path(), files.iter().map(|(n, _)| *n), opts)?;
    tracing::debug!(
        target: "nova.test_utils",
        files = files.len(),
        success = output.success(),
        "compiled java fixtures"
    );
    Ok(CompiledClasses { dir, output })
}

fn run_javac<'a>(
    root: &Path,
    files: impl IntoIterator<Item = &'a str>,
    opts: &JavacOptions,
) -> io::Result<JavacOutput> {
    let mut cmd = Command::new("javac");
    cmd.current_dir(root);
    cmd.args(["-encoding", "UTF-8"]);

    if opts.debug_info {
        cmd.arg("-g");
    } else {
        cmd.arg("-g:none");
    }
    // An explicit classpath keeps `javac` from inheriting `CLASSPATH`.
    cmd.args(["-classpath", "."]);
    cmd.arg("-d");
    cmd.arg(root.join("out"));

    for f in files {
        cmd.arg(f);
    }

    let out = cmd.output()?;
    Ok(JavacOutput {
        status: out.status,
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
    })
}

/// Whether `javac` is on `PATH`.
pub fn javac_available() -> bool {
    Command::new("javac")
        .arg("-version")
        .output()
        .is_ok_and(|out| out.status.success())
}
