use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "kebab-case")]
pub enum DatabaseProvider {
    #[strum(serialize = "Turso")]
    Turso,
    #[strum(serialize = "Supabase")]
    Supabase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "kebab-case")]
pub enum StorageProvider {
    #[strum(serialize = "Vercel Blob")]
    VercelBlob,
    #[strum(serialize = "AWS S3")]
    S3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString)]
#[serde(rename_all = "kebab-case")]
pub enum HostingProvider {
    #[strum(serialize = "Vercel")]
    Vercel,
}
