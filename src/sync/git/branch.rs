const ACTIVE_MARKER: char = '*';

/// Check the output of `git branch` whether the active branch is exactly `branch`.
///
/// Only the line marked with `*` is considered, so other local branches and branches
/// checked out in other worktrees (marked with `+`) never match.
pub fn is_active_branch(output: &str, branch: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(ACTIVE_MARKER))
        .any(|name| name.trim() == branch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRANCHES: &str = "  develop\n* master\n  release/1.0\n";

    #[test]
    fn it_should_match_the_active_branch() {
        assert!(is_active_branch(BRANCHES, "master"));
    }

    #[test]
    fn it_should_not_match_inactive_branches() {
        assert!(!is_active_branch(BRANCHES, "develop"));
        assert!(!is_active_branch(BRANCHES, "release/1.0"));
    }

    #[test]
    fn it_should_not_match_a_prefix_of_the_active_branch() {
        let output = "  main\n* feature-x\n";

        assert!(!is_active_branch(output, "feature"));
        assert!(is_active_branch(output, "feature-x"));
    }

    #[test]
    fn it_should_not_match_an_extension_of_the_active_branch() {
        assert!(!is_active_branch("* feature\n", "feature-x"));
    }

    #[test]
    fn it_should_not_match_a_detached_head() {
        let output = "* (HEAD detached at 1a2b3c4)\n  master\n";

        assert!(!is_active_branch(output, "master"));
    }

    #[test]
    fn it_should_not_match_branches_in_other_worktrees() {
        let output = "+ hotfix\n* master\n";

        assert!(!is_active_branch(output, "hotfix"));
    }

    #[test]
    fn it_should_handle_windows_line_endings() {
        assert!(is_active_branch("  develop\r\n* master\r\n", "master"));
    }

    #[test]
    fn it_should_not_match_empty_output() {
        assert!(!is_active_branch("", "master"));
        assert!(!is_active_branch("", ""));
    }
}
