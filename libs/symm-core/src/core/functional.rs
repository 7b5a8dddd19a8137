/// Every notification is handled only once, and so then can be moved!
/// The observer is reused for next events, while events are consumed.
pub trait NotificationHandlerOnce<T>: Send + Sync {
    fn handle_notification(&self, notification: T);
}

impl<F, T> NotificationHandlerOnce<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn handle_notification(&self, notification: T) {
        (self)(notification)
    }
}

pub trait IntoNotificationHandlerOnceBox<T> {
    fn into_notification_handler_once_box(self) -> Box<dyn NotificationHandlerOnce<T>>;
}

pub trait PublishSingle<T> {
    fn publish_single(&self, notification: T);
}

pub struct SingleObserver<T> {
    observer: Option<Box<dyn NotificationHandlerOnce<T>>>,
}

impl<T> Default for SingleObserver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SingleObserver<T> {
    pub fn new() -> Self {
        Self { observer: None }
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    /// There is only single observer that can be set, and so we call it 'set'
    pub fn set_observer(&mut self, observer: Box<dyn NotificationHandlerOnce<T>>) {
        self.observer = Some(observer);
    }

    pub fn set_observer_from(&mut self, observer: impl IntoNotificationHandlerOnceBox<T>) {
        self.observer = Some(observer.into_notification_handler_once_box());
    }
}

impl<T> PublishSingle<T> for SingleObserver<T> {
    /// There will be only one handler, and so we call it 'single'
    fn publish_single(&self, notification: T) {
        if let Some(observer) = &self.observer {
            observer.handle_notification(notification);
        }
    }
}

pub trait IntoObservableSingle<T>: Send + Sync {
    fn get_single_observer_mut(&mut self) -> &mut SingleObserver<T>;
}

/// Channels are the usual observers: events are forwarded to whoever owns
/// the receiving end.
pub mod channels {
    use std::any::type_name;

    use super::{IntoNotificationHandlerOnceBox, NotificationHandlerOnce};

    impl<T> NotificationHandlerOnce<T> for crossbeam::channel::Sender<T>
    where
        T: Send + Sync,
    {
        fn handle_notification(&self, notification: T) {
            if let Err(err) = self.send(notification) {
                tracing::warn!("Failed to send {}: {:?}", type_name::<T>(), err);
            }
        }
    }

    impl<T> IntoNotificationHandlerOnceBox<T> for crossbeam::channel::Sender<T>
    where
        T: Send + Sync + 'static,
    {
        fn into_notification_handler_once_box(self) -> Box<dyn NotificationHandlerOnce<T>> {
            Box::new(self)
        }
    }

    impl<T> NotificationHandlerOnce<T> for tokio::sync::mpsc::UnboundedSender<T>
    where
        T: Send + Sync,
    {
        fn handle_notification(&self, notification: T) {
            if let Err(err) = self.send(notification) {
                tracing::warn!("Failed to send {}: {:?}", type_name::<T>(), err);
            }
        }
    }

    impl<T> IntoNotificationHandlerOnceBox<T> for tokio::sync::mpsc::UnboundedSender<T>
    where
        T: Send + Sync + 'static,
    {
        fn into_notification_handler_once_box(self) -> Box<dyn NotificationHandlerOnce<T>> {
            Box::new(self)
        }
    }
}
