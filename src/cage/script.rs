// Startup Script
//
// Entry point executed by the jail (`exec.start=/app-start.sh`). Lists the
// `*.py`, `*.js`, `*.go` and `main` files in /app, takes the first name in
// ls(1) sort order and launches it with the matching interpreter.

/// File name of the startup script at the Cage root
pub const START_SCRIPT_NAME: &str = "app-start.sh";

/// Absolute path of the startup script inside the jail
pub const START_SCRIPT_JAIL_PATH: &str = "/app-start.sh";

/// Permission bits of the startup script
pub const START_SCRIPT_MODE: u32 = 0o755;

/// Message printed when no entry point is found
pub const NO_APP_MESSAGE: &str = "No executable application found";

/// Contents of `app-start.sh`
pub const START_SCRIPT: &str = r#"#!/bin/sh
cd /app
echo "Starting application..."
# Auto-detect executable file
APP=$(ls *.py *.js *.go main 2>/dev/null | head -1)
if [ -n "$APP" ]; then
    case "$APP" in
        *.go) go run "$APP" ;;
        *.py) python "$APP" ;;
        *.js) node "$APP" ;;
        *)    ./"$APP" ;;
    esac
else
    echo "No executable application found"
    exit 1
fi
"#;
