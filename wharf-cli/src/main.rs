use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use wharf::{diff, info, patch, pool, pwr, signature, signer, tlc, walk, wounds};

#[macro_export]
macro_rules! eprintln_exit {
  ($($arg:tt)*) => {{
    eprintln!($($arg)*);
    std::process::exit(1);
  }};
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Diff a source build against an old target build, writing a patch and signature
  Diff {
    /// The new build to diff
    #[arg(long)]
    source: PathBuf,

    /// The old build to diff against: a directory, a pre-computed `.sig` file,
    /// or `/dev/null` to produce a patch from nothing (first-ever upload)
    #[arg(long)]
    target: PathBuf,

    /// Where to write the patch; the signature is written alongside it with a `.sig` suffix
    #[arg(long)]
    recipe: PathBuf,

    /// Brotli compression quality (0-11)
    #[arg(long, default_value_t = 9)]
    quality: i32,

    /// Apply the freshly-written patch into a scratch directory and verify it
    /// against the freshly-written signature before returning
    #[arg(long)]
    verify: bool,
  },

  /// Apply a patch to an old build, producing a new build
  Apply {
    #[arg(long)]
    recipe: PathBuf,

    #[arg(long)]
    target: PathBuf,

    #[arg(long)]
    output: PathBuf,
  },

  /// Walk a build folder and write its signature
  Sign {
    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    signature: PathBuf,
  },

  /// Recompute a build folder's signature and compare it to a stored one
  Verify {
    #[arg(long)]
    signature: PathBuf,

    #[arg(long)]
    against: PathBuf,
  },

  /// Identify a wharf binary file and print a summary of its contents
  Ls { file: PathBuf },
}

fn main() {
  let cli = Cli::parse();

  match cli.command {
    Commands::Diff {
      source,
      target,
      recipe,
      quality,
      verify,
    } => cmd_diff(&source, &target, &recipe, quality, verify),
    Commands::Apply {
      recipe,
      target,
      output,
    } => cmd_apply(&recipe, &target, &output),
    Commands::Sign { output, signature } => cmd_sign(&output, &signature),
    Commands::Verify { signature, against } => cmd_verify(&signature, &against),
    Commands::Ls { file } => cmd_ls(&file),
  }
}

fn byte_progress_bar(len: u64) -> indicatif::ProgressBar {
  let bar = indicatif::ProgressBar::new(len);
  bar.set_style(
    indicatif::ProgressStyle::default_bar()
      .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) ({eta})")
      .expect("Invalid indicatif template???")
      .progress_chars("#>-"),
  );
  bar
}

fn fraction_progress_bar() -> indicatif::ProgressBar {
  let bar = indicatif::ProgressBar::new(100);
  bar.set_style(
    indicatif::ProgressStyle::default_bar()
      .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% ({eta})")
      .expect("Invalid indicatif template???")
      .progress_chars("#>-"),
  );
  bar
}

fn recipe_signature_path(recipe: &Path) -> PathBuf {
  let mut name: OsString = recipe.as_os_str().to_owned();
  name.push(".sig");
  PathBuf::from(name)
}

fn read_signature_container(
  path: &Path,
) -> (tlc::Container, Vec<pwr::BlockHash>) {
  let file = fs::File::open(path)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't open signature file \"{}\"!\n{e}", path.display()));
  let mut reader = BufReader::new(file);

  let mut sig = signature::Signature::read(&mut reader)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't read signature file \"{}\"!\n{e}", path.display()));

  let hashes: Vec<pwr::BlockHash> = sig
    .block_hash_iter
    .by_ref()
    .collect::<Result<_, _>>()
    .unwrap_or_else(|e: String| eprintln_exit!("Couldn't read block hashes!\n{e}"));

  (sig.container_new, hashes)
}

fn cmd_diff(source: &Path, target: &Path, recipe: &Path, quality: i32, verify: bool) {
  let compression = pwr::CompressionSettings {
    algorithm: pwr::CompressionAlgorithm::Brotli as i32,
    quality,
  };

  println!("Walking source build at \"{}\"...", source.display());
  let source_container = walk::walk(source, &walk::WalkOpts::default())
    .unwrap_or_else(|e| eprintln_exit!("Couldn't walk source build!\n{e}"));

  let (target_container, target_signature) = if target.as_os_str() == "/dev/null" {
    (tlc::Container::default(), Vec::new())
  } else if target.is_dir() {
    println!("Walking and signing target build at \"{}\"...", target.display());
    let container = walk::walk(target, &walk::WalkOpts::default())
      .unwrap_or_else(|e| eprintln_exit!("Couldn't walk target build!\n{e}"));

    let bar = byte_progress_bar(container.file_bytes());
    let hashes = signer::compute_signature(&container, target, |n| bar.inc(n))
      .unwrap_or_else(|e| eprintln_exit!("Couldn't sign target build!\n{e}"));
    bar.finish_and_clear();

    (container, hashes)
  } else {
    println!("Reading target signature from \"{}\"...", target.display());
    read_signature_container(target)
  };

  let new_pool = pool::FolderPool::new(Arc::new(source_container.clone()), source.to_owned());
  let mut ctx = diff::DiffContext::new(
    compression,
    target_container,
    target_signature,
    source_container,
    new_pool,
  );

  let mut patch_file = fs::File::create(recipe)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't create patch file \"{}\"!\n{e}", recipe.display()));
  let signature_path = recipe_signature_path(recipe);
  let mut signature_file = fs::File::create(&signature_path).unwrap_or_else(|e| {
    eprintln_exit!(
      "Couldn't create signature file \"{}\"!\n{e}",
      signature_path.display()
    )
  });

  let bar = fraction_progress_bar();
  ctx
    .write_patch(&mut patch_file, &mut signature_file, |fraction| {
      bar.set_position((fraction * 100.0) as u64);
    })
    .unwrap_or_else(|e| eprintln_exit!("Couldn't write patch!\n{e}"));
  bar.finish_and_clear();

  println!(
    "Wrote patch to \"{}\" and signature to \"{}\"",
    recipe.display(),
    signature_path.display()
  );

  let total = (ctx.reused_bytes + ctx.fresh_bytes).max(1) as f64;
  println!(
    "Reused {} bytes, added {} fresh bytes ({:.1}% reused)",
    ctx.reused_bytes,
    ctx.fresh_bytes,
    100.0 * ctx.reused_bytes as f64 / total,
  );

  if verify {
    self_check(target, recipe, &signature_path);
  }
}

fn self_check(target: &Path, recipe: &Path, signature_path: &Path) {
  if !target.is_dir() {
    println!("Skipping --verify self-check: target isn't a build folder on disk.");
    return;
  }

  println!("Running self-check...");
  let scratch = tempfile::tempdir()
    .unwrap_or_else(|e| eprintln_exit!("Couldn't create scratch directory for self-check!\n{e}"));

  let patch_file = fs::File::open(recipe)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't reopen patch for self-check!\n{e}"));
  let mut reader = BufReader::new(patch_file);
  let mut p = patch::Patch::read(&mut reader)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't decode patch for self-check!\n{e}"));

  p.apply(
    target,
    scratch.path(),
    None::<&mut signature::BlockHashIter<std::io::Empty>>,
    |_| {},
  )
  .unwrap_or_else(|e| eprintln_exit!("Self-check apply failed!\n{e}"));

  let sig_file = fs::File::open(signature_path)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't reopen signature for self-check!\n{e}"));
  let mut sig_reader = BufReader::new(sig_file);
  let mut sig = signature::Signature::read(&mut sig_reader)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't decode signature for self-check!\n{e}"));

  let issues = sig
    .verify_files(scratch.path(), |_| {})
    .unwrap_or_else(|e| eprintln_exit!("Self-check verification failed!\n{e}"));

  if issues.are_files_intact() {
    println!("Self-check passed.");
  } else {
    eprintln_exit!(
      "Self-check failed: {} file(s) don't match the freshly-written signature!",
      issues.files.len()
    );
  }
}

fn cmd_apply(recipe: &Path, target: &Path, output: &Path) {
  let file = fs::File::open(recipe)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't open patch file \"{}\"!\n{e}", recipe.display()));
  let mut reader = BufReader::new(file);

  let mut p = patch::Patch::read(&mut reader)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't decode patch file!\n{e}"));

  let bar = byte_progress_bar(p.container_new.file_bytes());
  p.apply(
    target,
    output,
    None::<&mut signature::BlockHashIter<std::io::Empty>>,
    |n| bar.inc(n),
  )
  .unwrap_or_else(|e| eprintln_exit!("Couldn't apply patch!\n{e}"));
  bar.finish_and_clear();

  println!("Applied patch into \"{}\"", output.display());
}

fn cmd_sign(output: &Path, signature_path: &Path) {
  let container = walk::walk(output, &walk::WalkOpts::default())
    .unwrap_or_else(|e| eprintln_exit!("Couldn't walk build folder!\n{e}"));

  let bar = byte_progress_bar(container.file_bytes());
  let hashes = signer::compute_signature(&container, output, |n| bar.inc(n))
    .unwrap_or_else(|e| eprintln_exit!("Couldn't sign build folder!\n{e}"));
  bar.finish_and_clear();

  let mut writer = fs::File::create(signature_path).unwrap_or_else(|e| {
    eprintln_exit!(
      "Couldn't create signature file \"{}\"!\n{e}",
      signature_path.display()
    )
  });

  let compression = pwr::CompressionSettings {
    algorithm: pwr::CompressionAlgorithm::Brotli as i32,
    quality: 1,
  };

  signature::write::write_signature(&mut writer, &compression, &container, hashes)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't write signature file!\n{e}"));

  println!("Wrote signature to \"{}\"", signature_path.display());
}

fn cmd_verify(signature_path: &Path, against: &Path) {
  let file = fs::File::open(signature_path).unwrap_or_else(|e| {
    eprintln_exit!(
      "Couldn't open signature file \"{}\"!\n{e}",
      signature_path.display()
    )
  });
  let mut reader = BufReader::new(file);

  let mut sig = signature::Signature::read(&mut reader)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't decode signature file!\n{e}"));

  let bar = byte_progress_bar(sig.container_new.file_bytes());
  let issues = sig
    .verify_files(against, |n| bar.inc(n))
    .unwrap_or_else(|e| eprintln_exit!("Couldn't verify build folder!\n{e}"));
  bar.finish_and_clear();

  if issues.are_files_intact() {
    println!("All files are intact.");
  } else {
    eprintln_exit!(
      "{} file(s) are broken or missing, {} byte(s) need fixing.",
      issues.files.len(),
      issues.bytes_to_fix(&sig.container_new)
    );
  }
}

fn cmd_ls(file_path: &Path) {
  let file = fs::File::open(file_path)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't open file \"{}\"!\n{e}", file_path.display()));
  let mut reader = BufReader::new(file);

  match info::identify(&mut reader)
    .unwrap_or_else(|e| eprintln_exit!("Couldn't identify wharf binary!\n{e}"))
  {
    info::WharfBinary::Patch(p) => {
      println!("Patch file, compressed with {}", p.header.compression.unwrap_or_default());
      p.container_old.print_summary("old build");
      p.container_new.print_summary("new build");
    }
    info::WharfBinary::Signature(s) => {
      println!("Signature file, compressed with {}", s.header.compression.unwrap_or_default());
      s.container_new.print_summary("build");
    }
    info::WharfBinary::Manifest(m) => {
      println!("Manifest file, compressed with {}", m.header.compression.unwrap_or_default());
      m.container.print_summary("expected build");
    }
    info::WharfBinary::Wounds(_) => {
      println!("Wounds file");
      let mut count = 0u64;
      while let Some(wound) = wounds::next_wound(&mut reader) {
        let wound = wound
          .unwrap_or_else(|e| eprintln_exit!("Couldn't read wound from stream!\n{e}"));
        println!(
          "  file {} bytes [{}, {})",
          wound.file_index, wound.start, wound.end
        );
        count += 1;
      }
      println!("{count} wound(s)");
    }
  }
}
