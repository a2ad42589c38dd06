// src/runtime_paths.rs
//
// Search-path glue for external application runtimes. When the binary is
// installed in a package layout (`<prefix>/bin/nibiru` with the native
// module at `<prefix>/lib/nibiru/libnibiru.so`), the module search
// variables gain the sibling directories. Existing values are preserved
// behind the new entries. The built-in registry ignores these; external
// runtimes read them.

use std::env;
use std::path::Path;

/// Colon-separated search path for pure-source application modules.
pub const MODULE_PATH_VAR: &str = "NIBIRU_PATH";

/// Colon-separated search path for native application modules.
pub const NATIVE_PATH_VAR: &str = "NIBIRU_CPATH";

const NATIVE_MODULE: &str = "libnibiru.so";

/// Augment the search variables if the executable sits in a package layout.
/// Must run before any threads exist; the CLI calls it first thing.
pub fn augment_search_paths() {
    let Ok(exe) = env::current_exe() else {
        return;
    };
    let Some(bin_dir) = exe.parent() else {
        return;
    };
    let Some(prefix) = bin_dir.parent() else {
        return;
    };

    let native_dir = prefix.join("lib").join("nibiru");
    if !native_dir.join(NATIVE_MODULE).is_file() {
        return;
    }
    let module_dir = prefix.join("share").join("nibiru");

    prepend(MODULE_PATH_VAR, &module_dir);
    prepend(NATIVE_PATH_VAR, &native_dir);
}

fn prepend(var: &str, dir: &Path) {
    let dir = dir.to_string_lossy();
    let value = match env::var(var) {
        Ok(existing) if !existing.is_empty() => format!("{dir}:{existing}"),
        _ => dir.into_owned(),
    };
    unsafe {
        env::set_var(var, value);
    }
}
