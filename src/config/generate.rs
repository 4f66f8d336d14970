pub fn generate_sample_config() -> String {
    r#"# =============================================================================
# ESDUMP CONFIGURATION
# =============================================================================
# Connection and paging settings shared by `esdump dump` and `esdump restore`.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/esdump/config.yml
#   3. /etc/esdump/config.yml
#
# Values may reference environment variables as $env{VAR_NAME}.

# =============================================================================
# CLUSTER
# =============================================================================
cluster:
  # Base URL of the cluster (http:// or https://)
  url: http://localhost:9200

  # Basic auth credentials; set both or neither
  # username: $env{ES_USER}
  # password: $env{ES_PASSWORD}

  # Per-request timeout
  timeout: 30s

  # Accept gzip-compressed responses
  http_compress: true

# =============================================================================
# SCROLL
# =============================================================================
scroll:
  # How long the cluster keeps the scroll context alive between pages
  keep_alive: 5m

  # Hits fetched per scroll request
  page_size: 100

# =============================================================================
# DUMP
# =============================================================================
dump:
  # Documents per batch file (overridable with --batch-size)
  batch_size: 10000
"#
    .to_string()
}
