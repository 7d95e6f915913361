pub const MANIFEST_FILE_NAME: &str = ".resource-manifest.json";
pub const VERCEL_PROJECT_LINK: &str = ".vercel/project.json";

// engine configuration
pub const RESOURCE_ENGINE_MODE: &str = "RESOURCE_ENGINE_MODE";
pub const AUTO_PROVISION: &str = "AUTO_PROVISION";
pub const TURSO_GROUP: &str = "TURSO_GROUP";
pub const SUPABASE_ORG_ID: &str = "SUPABASE_ORG_ID";
pub const SUPABASE_REGION: &str = "SUPABASE_REGION";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const VERCEL_TOKEN: &str = "VERCEL_TOKEN";
pub const VENDOR_TIMEOUT_SECONDS: &str = "VENDOR_TIMEOUT_SECONDS";

// credentials written into env files
pub const TURSO_DATABASE_URL: &str = "TURSO_DATABASE_URL";
pub const TURSO_AUTH_TOKEN: &str = "TURSO_AUTH_TOKEN";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const BLOB_STORE_ID: &str = "BLOB_STORE_ID";
pub const BLOB_READ_WRITE_TOKEN: &str = "BLOB_READ_WRITE_TOKEN";
pub const S3_BUCKET: &str = "S3_BUCKET";
pub const S3_REGION: &str = "S3_REGION";
pub const S3_ENDPOINT: &str = "S3_ENDPOINT";
pub const S3_PUBLIC_URL: &str = "S3_PUBLIC_URL";

/// Every key the engine may write, used by discovery to recognize managed variables.
pub const MANAGED_ENV_KEYS: &[&str] = &[
    TURSO_DATABASE_URL,
    TURSO_AUTH_TOKEN,
    DATABASE_URL,
    SUPABASE_URL,
    SUPABASE_ANON_KEY,
    BLOB_STORE_ID,
    BLOB_READ_WRITE_TOKEN,
    S3_BUCKET,
    S3_REGION,
    S3_ENDPOINT,
    S3_PUBLIC_URL,
];
