use crate::cmd::command::{VendorCli, VendorInvocation};
use crate::errors::CommandError;
use std::sync::Arc;

const AWS_BINARY: &str = "aws";
const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
// us-east-1 rejects an explicit location constraint
const AWS_LEGACY_REGION: &str = "us-east-1";

/// S3 buckets, driven through the `aws` CLI. Credentials come from the ambient AWS profile.
#[derive(Clone)]
pub struct S3Cli {
    cli: Arc<dyn VendorCli>,
    region: String,
}

impl S3Cli {
    pub fn new(cli: Arc<dyn VendorCli>, region: &str) -> Self {
        S3Cli {
            cli,
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        self.region.as_str()
    }

    fn invocation(&self, args: &[&str]) -> VendorInvocation {
        VendorInvocation::new(AWS_BINARY, args).with_env(AWS_DEFAULT_REGION, &self.region)
    }

    pub fn create_bucket(&self, bucket_name: &str) -> Result<(), CommandError> {
        info!("creating S3 bucket `{}` in `{}`", bucket_name, self.region);
        let location_constraint = format!("LocationConstraint={}", self.region);
        let mut args = vec!["s3api", "create-bucket", "--bucket", bucket_name, "--region", self.region.as_str()];
        if self.region != AWS_LEGACY_REGION {
            args.extend(["--create-bucket-configuration", location_constraint.as_str()]);
        }

        self.cli.run(&self.invocation(&args)).map(|_| ())
    }

    pub fn delete_bucket(&self, bucket_name: &str) -> Result<(), CommandError> {
        info!("deleting S3 bucket `{}`", bucket_name);
        let bucket_url = format!("s3://{}", bucket_name);
        self.cli
            .run(&self.invocation(&["s3", "rb", bucket_url.as_str(), "--force"]))
            .map(|_| ())
    }

    pub fn endpoint(&self) -> String {
        format!("https://s3.{}.amazonaws.com", self.region)
    }

    pub fn public_url(&self, bucket_name: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com", bucket_name, self.region)
    }
}
