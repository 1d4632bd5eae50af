//! Built-in block-list profiles for hold mode
//!
//! Pure data: pattern tables mapping command signatures to the hold-mode
//! block list. A pattern is either a bare program name (`"rm"`) or a
//! program plus leading arguments (`"git push"`); matching is done on the
//! sub-command signature at token boundaries.

/// State-mutating utilities blocked by every profile while in hold mode
pub const STANDARD_BLOCK: &[&str] = &[
    // Filesystem mutation
    "rm",
    "rmdir",
    "mv",
    "cp",
    "dd",
    "mkfs",
    "shred",
    "truncate",
    "ln",
    "mkdir",
    "touch",
    "tee",
    "chmod",
    "chown",
    "chgrp",
    // Process/system control
    "kill",
    "pkill",
    "killall",
    "shutdown",
    "reboot",
    "halt",
    // VCS state
    "git push",
    "git commit",
    "git reset",
    "git clean",
    "git rebase",
    "git merge",
    "git checkout",
    // Package managers
    "npm install",
    "npm publish",
    "cargo install",
    "pip install",
    "pip3 install",
    "apt",
    "apt-get",
    "yum",
    "dnf",
    "brew install",
];

/// Additional block list for the strict profile: interpreters, network
/// tools and schedulers
pub const STRICT_EXTRA_BLOCK: &[&str] = &[
    // Interpreters
    "python",
    "python3",
    "node",
    "deno",
    "bun",
    "ruby",
    "perl",
    "php",
    "sh",
    "bash",
    "zsh",
    "fish",
    // Network tools
    "curl",
    "wget",
    "nc",
    "ncat",
    "netcat",
    "ssh",
    "scp",
    "sftp",
    "rsync",
    "telnet",
    // Schedulers
    "crontab",
    "at",
    "batch",
    "systemctl",
    "launchctl",
    "schtasks",
];

/// Resolve a profile name to its block-list patterns
///
/// Unknown profile names fall back to `standard`: an unrecognized profile
/// must never mean an empty block list.
pub fn block_list(profile: &str) -> Vec<&'static str> {
    match profile {
        "strict" => {
            let mut list = STANDARD_BLOCK.to_vec();
            list.extend_from_slice(STRICT_EXTRA_BLOCK);
            list
        }
        "standard" => STANDARD_BLOCK.to_vec(),
        other => {
            tracing::warn!(
                "[Hold] Unknown profile '{}', falling back to standard",
                other
            );
            STANDARD_BLOCK.to_vec()
        }
    }
}
