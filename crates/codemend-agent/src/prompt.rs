//! Prompt templates. Both ask for the same reply format so one parser
//! handles generation and repair replies.

const REPLY_FORMAT: &str = r#"Reply in exactly this format:

```python
# the complete Python script
```

DEPENDENCIES: package1,package2 (write DEPENDENCIES: none if no third-party packages are needed)

EXPLANATION: "#;

pub fn generation_prompt(request: &str) -> String {
    format!(
        r#"You are a Python code generation assistant. The user describes a task and you write the Python code for it.

Requirements:
1. The script must be complete and runnable as-is
2. Add comments where they help
3. Use import statements for every third-party library you need
4. Include appropriate error handling

User request: {request}

{format}a short description of what the code does and how it works
"#,
        request = request,
        format = REPLY_FORMAT,
    )
}

pub fn repair_prompt(request: &str, prior_code: &str, error_text: &str, attempt: u32) -> String {
    format!(
        r#"You are a Python code repair assistant. You previously wrote code for the user's request, but running it failed. Analyze the error and fix the code.

Original user request: {request}

Previous code:
```python
{prior_code}
```

Error produced when running it:
{error_text}

Fixing requirements:
1. Find the root cause from the error output
2. Return the complete fixed script, not a diff
3. Improve error handling where it matters
4. If a third-party library is the problem, consider an alternative or a newer API
5. Make sure the script runs to completion

This is repair attempt {attempt}.

{format}the cause of the error and how it was fixed
"#,
        request = request,
        prior_code = prior_code,
        error_text = error_text,
        attempt = attempt,
        format = REPLY_FORMAT,
    )
}
