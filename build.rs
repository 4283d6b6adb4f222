// build.rs

use chrono::Utc;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("build_info.rs");

    // stamped into the --version banner
    let build_date = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let long_version = format!("{} (built {})", env!("CARGO_PKG_VERSION"), build_date);

    fs::write(
        &dest_path,
        format!(
            "pub const BUILD_DATE: &str = \"{}\";\npub const LONG_VERSION: &str = \"{}\";\n",
            build_date, long_version
        ),
    ).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
