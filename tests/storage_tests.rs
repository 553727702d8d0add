use scholar_vault::storage::{
    DocumentKey, MockStorageService, S3StorageClient, StorageService, flatten_filename,
};

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_document_key_is_scoped_to_author() {
        let key = DocumentKey::for_thesis(7, "final.pdf");
        let key = key.as_str();
        assert!(key.starts_with("theses/7/"));
        assert!(key.ends_with("-final.pdf"));
        // uuid (32 hex) + "-" between the prefix and the filename
        assert_eq!(key.len(), "theses/7/".len() + 32 + 1 + "final.pdf".len());
    }

    #[test]
    fn test_same_filename_never_collides() {
        assert_ne!(
            DocumentKey::for_thesis(7, "final.pdf"),
            DocumentKey::for_thesis(7, "final.pdf")
        );
    }

    #[test]
    fn test_filename_is_flattened_into_one_segment() {
        assert_eq!(flatten_filename("../drafts/final.pdf"), "drafts_final.pdf");
        assert_eq!(flatten_filename("a/./b//c.pdf"), "a_b_c.pdf");
        assert_eq!(flatten_filename("..\\..\\evil.pdf"), "evil.pdf");
        assert_eq!(flatten_filename("../.."), "document.pdf");

        let key = DocumentKey::for_thesis(3, "../../etc/passwd");
        assert!(!key.as_str().contains(".."));
        assert_eq!(key.as_str().matches('/').count(), 2);
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = DocumentKey::for_thesis(7, "final.pdf");
        let url = mock.presign_document_upload(&key).await.unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key.as_str()));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock
            .presign_document_upload(&DocumentKey::for_thesis(7, "final.pdf"))
            .await;
        assert!(result.is_err());
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    async fn local_client() -> S3StorageClient {
        S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
        .await
    }

    /// Presigning is computed locally, so no MinIO needs to be running.
    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = local_client().await;

        let key = DocumentKey::for_thesis(1, "report.pdf");
        let url = client.presign_document_upload(&key).await.unwrap();

        assert!(url.starts_with("http://localhost:9000/testbucket/"));
        assert!(url.contains(key.as_str()));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}
