/// Resolves `path` against the working directory `cwd` into an absolute,
/// slash-separated remote path. `.` segments are dropped and `..` never
/// climbs above `/`.
pub fn resolve_remote_path(cwd: &str, path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let joined = if path.starts_with('/') {
        [path, ""]
    } else {
        [cwd, path]
    };
    for part in joined.iter().flat_map(|p| p.split('/')) {
        match part {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
