// src/shim.rs

//! Harness scripts for the interpreted languages.
//!
//! The Rust side never evaluates submitted code. For JavaScript and Python
//! it spawns the interpreter on a tiny harness script that:
//! - evaluates the submission as a script (free-form printing allowed)
//! - exposes the fixture input on stdin and as `input` / `INPUT`
//! - if the submission defines the entry function, calls it with the parsed
//!   input and prints ONE line `Result: <compact json>`
//! - on an uncaught error, writes the trace to stderr and exits with 1
//!
//! Input parsing: valid JSON is passed as a single argument; otherwise the
//! text is read as a JSON argument list, so `[1,3,5], 7` calls
//! `entry([1,3,5], 7)`. Anything else is passed through as a string.

/// Node.js harness (CommonJS).
///
/// Usage (internal):
/// node harness.cjs <solution.js> <entry>
pub fn node_shim() -> &'static str {
    r#""use strict";
const fs = require("node:fs");
const vm = require("node:vm");

const [, , solutionPath, entry] = process.argv;

function die(error) {
  process.stderr.write(String((error && error.stack) || error) + "\n");
  process.exit(1);
}

function parseInput(raw) {
  const text = raw.trim();
  if (text === "") return [];
  try { return [JSON.parse(text)]; } catch (_) {}
  try { return JSON.parse("[" + text + "]"); } catch (_) {}
  return [text];
}

let input = "";
try {
  input = fs.readFileSync(0, "utf8");
} catch (_) {
  input = "";
}

const code = fs.readFileSync(solutionPath, "utf8");
const module_ = { exports: {} };
const sandbox = {
  console,
  require,
  process,
  input,
  module: module_,
  exports: module_.exports,
  setTimeout,
  clearTimeout,
  setInterval,
  clearInterval,
};
vm.createContext(sandbox);

let fn;
try {
  vm.runInContext(code, sandbox, { filename: "solution.js" });
  // A second script in the same context sees top-level const/let/class too.
  fn = vm.runInContext(
    `typeof ${entry} === "function" ? ${entry} : undefined`,
    sandbox
  );
  if (fn === undefined && typeof module_.exports[entry] === "function") {
    fn = module_.exports[entry];
  }
} catch (e) {
  die(e);
}

if (typeof fn === "function") {
  Promise.resolve()
    .then(() => fn(...parseInput(input)))
    .then((result) => {
      const json = JSON.stringify(result === undefined ? null : result);
      process.stdout.write("Result: " + json + "\n");
    })
    .catch(die);
}
"#
}

/// Python harness.
///
/// Usage (internal):
/// python3 harness.py <solution.py> <entry>
pub fn python_shim() -> &'static str {
    r#"import io
import json
import sys
import traceback


def parse_input(raw):
    text = raw.strip()
    if text == "":
        return []
    try:
        return [json.loads(text)]
    except ValueError:
        pass
    try:
        return json.loads("[" + text + "]")
    except ValueError:
        return [text]


def main():
    solution_path, entry = sys.argv[1], sys.argv[2]
    raw = sys.stdin.read()
    sys.stdin = io.StringIO(raw)

    with open(solution_path, "r", encoding="utf-8") as f:
        source = f.read()

    namespace = {"__name__": "__main__", "__file__": solution_path, "INPUT": raw}

    try:
        exec(compile(source, "solution.py", "exec"), namespace)
        fn = namespace.get(entry)
        if callable(fn):
            result = fn(*parse_input(raw))
            sys.stdout.write(
                "Result: " + json.dumps(result, separators=(",", ":"), default=str) + "\n"
            )
    except SystemExit:
        raise
    except BaseException:
        traceback.print_exc()
        sys.exit(1)


if __name__ == "__main__":
    main()
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harnesses_print_the_result_marker() {
        assert!(node_shim().contains("\"Result: \""));
        assert!(python_shim().contains("\"Result: \""));
    }

    #[test]
    fn test_python_harness_emits_compact_json() {
        assert!(python_shim().contains(r#"separators=(",", ":")"#));
    }
}
