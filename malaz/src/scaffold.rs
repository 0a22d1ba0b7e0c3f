//! Project scaffolding from built-in templates

use std::path::Path;
use tracing::{debug, info};

use crate::tools::{PathSandbox, ToolError};

/// One entry of a template; paths ending in `/` are directories
enum Entry {
    File(&'static str),
    Notebook,
    Dir,
}

/// A built-in project template
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    structure: &'static [(&'static str, Entry)],
}

const FLASK_APP: &str = "from flask import Flask

app = Flask(__name__)

@app.route('/')
def home():
    return 'Hello, World!'

if __name__ == '__main__':
    app.run(debug=True)";

const CLI_MAIN: &str = "import argparse

def main():
    parser = argparse.ArgumentParser(description='My CLI Tool')
    parser.add_argument('input', help='Input file')
    args = parser.parse_args()
    print(f'Processing {args.input}')

if __name__ == '__main__':
    main()";

const CLI_SETUP: &str = "from setuptools import setup

setup(
    name='my-tool',
    version='0.1.0',
    py_modules=['main'],
    install_requires=[],
    entry_points={
        'console_scripts': [
            'mytool = main:main',
        ],
    },
)";

pub static TEMPLATES: &[Template] = &[
    Template {
        name: "flask_web_app",
        description: "Basic Flask web application",
        structure: &[
            ("app.py", Entry::File(FLASK_APP)),
            ("templates/", Entry::Dir),
            ("static/", Entry::Dir),
            ("requirements.txt", Entry::File("flask\n")),
        ],
    },
    Template {
        name: "cli_tool",
        description: "Python CLI tool with argument parsing",
        structure: &[("main.py", Entry::File(CLI_MAIN)), ("setup.py", Entry::File(CLI_SETUP))],
    },
    Template {
        name: "data_analysis",
        description: "Jupyter-based data analysis project",
        structure: &[
            ("notebooks/exploratory.ipynb", Entry::Notebook),
            ("data/", Entry::Dir),
            ("requirements.txt", Entry::File("pandas\nnumpy\nmatplotlib\njupyter\n")),
        ],
    },
];

/// Template names in catalogue order
pub fn template_names() -> Vec<&'static str> {
    TEMPLATES.iter().map(|t| t.name).collect()
}

/// `(name, description)` of every template
pub fn list_templates() -> Vec<(&'static str, &'static str)> {
    TEMPLATES.iter().map(|t| (t.name, t.description)).collect()
}

pub fn find_template(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}

fn starter_notebook() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "cells": [
            {
                "cell_type": "code",
                "execution_count": null,
                "metadata": {},
                "outputs": [],
                "source": [
                    "import pandas as pd\n",
                    "import numpy as np\n",
                    "import matplotlib.pyplot as plt\n\n",
                    "# Load your data here\n",
                    "# df = pd.read_csv('data.csv')"
                ]
            }
        ],
        "metadata": {
            "kernelspec": {
                "display_name": "Python 3",
                "language": "python",
                "name": "python3"
            }
        },
        "nbformat": 4,
        "nbformat_minor": 4
    }))
}

/// Creates projects from templates inside the sandbox
pub struct Scaffolder<'a> {
    sandbox: &'a PathSandbox,
}

impl<'a> Scaffolder<'a> {
    pub fn new(sandbox: &'a PathSandbox) -> Self {
        Self { sandbox }
    }

    /// Materialize `template` at `project_path`
    ///
    /// The target must not exist yet.
    pub async fn create_project(&self, template: &str, project_path: &str) -> Result<String, ToolError> {
        debug!(%template, %project_path, "Scaffolder::create_project: called");
        let Some(found) = find_template(template) else {
            debug!("Scaffolder::create_project: unknown template");
            return Err(ToolError::UnknownTemplate {
                name: template.to_string(),
            });
        };

        let target = self.sandbox.resolve(project_path)?;
        if tokio::fs::symlink_metadata(target.as_path()).await.is_ok() {
            debug!(%target, "Scaffolder::create_project: target exists");
            return Err(ToolError::AlreadyExists {
                path: project_path.to_string(),
            });
        }

        tokio::fs::create_dir_all(target.as_path()).await?;
        for (rel, entry) in found.structure {
            let full = target.as_path().join(rel.trim_end_matches('/'));
            write_entry(&full, entry).await?;
        }

        info!(%template, %project_path, "Scaffolder::create_project: project created");
        Ok(format!("Project created at {} using template '{}'", project_path, template))
    }
}

async fn write_entry(full: &Path, entry: &Entry) -> Result<(), ToolError> {
    match entry {
        Entry::Dir => {
            tokio::fs::create_dir_all(full).await?;
        }
        Entry::File(content) => {
            create_parent(full).await?;
            tokio::fs::write(full, content).await?;
        }
        Entry::Notebook => {
            create_parent(full).await?;
            tokio::fs::write(full, starter_notebook()?).await?;
        }
    }
    Ok(())
}

async fn create_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_templates() {
        let templates = list_templates();
        assert_eq!(templates.len(), 3);
        assert_eq!(templates[0], ("flask_web_app", "Basic Flask web application"));
        assert_eq!(template_names(), vec!["flask_web_app", "cli_tool", "data_analysis"]);
    }

    #[tokio::test]
    async fn test_create_flask_project() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let result = Scaffolder::new(&sandbox).create_project("flask_web_app", "web").await.unwrap();
        assert_eq!(result, "Project created at web using template 'flask_web_app'");

        let root = temp.path().join("web");
        assert!(root.join("app.py").is_file());
        assert!(root.join("templates").is_dir());
        assert!(root.join("static").is_dir());
        assert_eq!(std::fs::read_to_string(root.join("requirements.txt")).unwrap(), "flask\n");
    }

    #[tokio::test]
    async fn test_create_data_analysis_notebook() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        Scaffolder::new(&sandbox)
            .create_project("data_analysis", "nb")
            .await
            .unwrap();

        let notebook = std::fs::read_to_string(temp.path().join("nb/notebooks/exploratory.ipynb")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&notebook).unwrap();
        assert_eq!(parsed["nbformat"], 4);
        assert!(temp.path().join("nb/data").is_dir());
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let result = Scaffolder::new(&sandbox).create_project("rails_app", "x").await;
        assert!(matches!(result, Err(ToolError::UnknownTemplate { .. })));
        assert!(!temp.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_existing_target() {
        let temp = tempdir().unwrap();
        std::fs::create_dir(temp.path().join("taken")).unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let result = Scaffolder::new(&sandbox).create_project("cli_tool", "taken").await;
        assert!(matches!(result, Err(ToolError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_target_outside_sandbox() {
        let temp = tempdir().unwrap();
        let sandbox = PathSandbox::new(temp.path()).unwrap();

        let result = Scaffolder::new(&sandbox).create_project("cli_tool", "../escape").await;
        assert!(matches!(result, Err(ToolError::Security(_))));
    }
}
