#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub config: Option<String>,
    pub command: String,
    pub input: Option<String>,
}

impl CommandLineConfig {
    pub fn from_args(args: &[&str]) -> Result<Self, String> {
        let mut config = None;
        let mut command = String::from("entities");
        let mut input = None;
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match *arg {
                "--config" => {
                    config = Some(
                        iter.next()
                            .ok_or_else(|| "--config requires a value".to_string())?
                            .to_string(),
                    );
                }
                "--command" => {
                    command = iter
                        .next()
                        .ok_or_else(|| "--command requires a value".to_string())?
                        .to_string();
                }
                "--input" => {
                    input = Some(
                        iter.next()
                            .ok_or_else(|| "--input requires a value".to_string())?
                            .to_string(),
                    );
                }
                other if other.starts_with('-') => {
                    return Err(format!("unknown flag {other}"));
                }
                _ => {
                    command = arg.to_string();
                }
            }
        }
        Ok(Self {
            config,
            command,
            input,
        })
    }

    pub fn require_config(&self) -> Result<&str, String> {
        self.config
            .as_deref()
            .ok_or_else(|| "--config is required".to_string())
    }

    pub fn require_input(&self) -> Result<&str, String> {
        self.input
            .as_deref()
            .ok_or_else(|| format!("{} requires --input", self.command))
    }

    pub fn help() -> &'static str {
        "Usage: entitymap --config FILE [--command entities|translate|count] [--input TEXT]\n\
         \n\
         entities   list mapped entities with their tables\n\
         translate  expand placeholders in --input SQL\n\
         count      count rows of the entity named by --input\n"
    }
}
