//! Workflow definitions used across test suites.

use tempfile::TempDir;

/// Input, one prompt, output.
pub const GREETER: &str = r#"workflow: Greeter
in: input()
p: prompt(user="Hello {{name}}")
out: output(key="result", value="$p_result")
in --> p --> out
"#;

/// A condition with both branches plus an unconditional follow-up.
pub const BRANCHING: &str = r#"workflow: Branching
start: input()
check: condition(expression="$x > 5")
big: output(key="size", value="big")
small: output(key="size", value="small")
after: output(key="done", value="yes")
start --> check
check ==> big
check =/> small
check --> after
"#;

/// Two paths that meet at one node.
pub const DIAMOND: &str = r#"workflow: Diamond
in: input()
left: agent(name="echo", input="$left_value")
right: agent(name="echo", input="$right_value")
join: output(key="joined", value="$left_result")
in --> left --> join
in --> right --> join
left_value := "L"
right_value := "R"
"#;

/// Agent feeding a function.
pub const PIPELINE: &str = r#"workflow: Pipeline
in: input()
fetch: agent(name="fetcher", input="{\"topic\": \"$topic\"}")
shape: function(name="shaper", input="{\"data\": \"$fetch_result\", \"limit\": \"$limit\"}")
out: output(value="$shape_result")
in --> fetch --> shape --> out
limit := 3
"#;

/// Write `(file name, contents)` pairs into a fresh temporary directory.
pub fn write_workflow_dir(files: &[(&str, &str)]) -> std::io::Result<TempDir> {
    let dir = tempfile::tempdir()?;
    for (name, contents) in files {
        std::fs::write(dir.path().join(name), contents)?;
    }
    Ok(dir)
}

