use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    /// Longest accepted flag key, in characters.
    #[envconfig(default = "200")]
    pub max_flag_key_length: usize,

    /// Largest accepted default or override value, in bytes.
    #[envconfig(default = "65536")]
    pub max_value_bytes: usize,

    /// Most audit records returned by one history call.
    #[envconfig(default = "500")]
    pub audit_history_limit: usize,
}

impl Config {
    pub fn default_test_config() -> Self {
        Config {
            max_flag_key_length: 200,
            max_value_bytes: 65536,
            audit_history_limit: 500,
        }
    }
}
