fn main() {
  let git_output =
    std::process::Command::new("git").args(["describe", "--always", "--tags", "--long", "--dirty"]).output().ok();
  let git_info = git_output.as_ref().and_then(|output| std::str::from_utf8(&output.stdout).ok().map(str::trim));
  let cargo_pkg_version = env!("CARGO_PKG_VERSION");

  // Fall back to the cargo version when git metadata is unavailable.
  let git_describe = match git_info {
    Some(info) if info.contains(cargo_pkg_version) => info.replace('g', ""),
    Some(info) => format!("v{}-{}", cargo_pkg_version, info),
    None => String::from(cargo_pkg_version),
  };

  println!("cargo:rustc-env=_GIT_INFO={}", git_describe);
}
