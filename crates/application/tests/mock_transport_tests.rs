use std::time::Duration;

use application::DomeController;
use async_trait::async_trait;
use domain::dome::{ShutterOperation, ShutterPhase};
use domain::protocol::DeviceProfile;
use domain::{DomainError, DomePolicy, Transport};
use mockall::mock;

mock! {
    pub Link {}

    #[async_trait]
    impl Transport for Link {
        async fn write(&mut self, bytes: &[u8]) -> Result<(), DomainError>;
        async fn read_until(
            &mut self,
            delimiter: u8,
            timeout: Duration,
        ) -> Result<Vec<u8>, DomainError>;
        async fn close(&mut self) -> Result<(), DomainError>;
        fn describe(&self) -> &str;
    }
}

#[tokio::test]
async fn test_busy_shutter_sends_nothing() {
    let mut link = MockLink::new();
    link.expect_write()
        .withf(|bytes| bytes.starts_with(b"@OP"))
        .never();
    link.expect_write()
        .withf(|bytes| !bytes.starts_with(b"@OP"))
        .times(2)
        .returning(|_| Ok(()));

    let mut replies = vec![b":CLS#".to_vec(), b":FVC03.02#".to_vec()];
    link.expect_read_until()
        .times(2)
        .returning(move |_, _| replies.pop().ok_or(DomainError::Timeout(Duration::ZERO)));

    let mut controller = DomeController::new(DeviceProfile::default(), DomePolicy::default());
    controller.connect(Box::new(link)).await.unwrap();
    controller
        .control_shutter(ShutterOperation::Close)
        .await
        .unwrap();

    let result = controller.control_shutter(ShutterOperation::Open).await;

    assert!(matches!(result, Err(DomainError::Busy(_))));
    assert_eq!(controller.state().shutter(), ShutterPhase::Closing);
}

#[tokio::test]
async fn test_rejected_move_never_reaches_the_wire() {
    let mut link = MockLink::new();
    link.expect_write().times(1).returning(|_| Ok(()));
    link.expect_read_until()
        .times(1)
        .returning(|_, _| Ok(b":FVC03.02#".to_vec()));

    let mut controller = DomeController::new(DeviceProfile::default(), DomePolicy::default());
    controller.connect(Box::new(link)).await.unwrap();

    let result = controller.move_absolute(f64::NAN).await;
    assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
}
